pub mod reader;
pub mod utils;

pub use reader::{read_workbook, rows_to_records};
pub use utils::{is_xlsx_type, load_file_from_url};
