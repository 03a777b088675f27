use bytes::Bytes;
use reqwest::Client;
use crate::error::AppError;

pub fn is_xlsx_type(file_type: &str) -> bool {
    let file_type = file_type.to_lowercase();
    file_type.contains("xlsx") || file_type.contains("spreadsheetml")
}

pub async fn load_file_from_url(url: &str, max_size: usize) -> Result<Bytes, AppError> {
    let client = Client::new();
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| AppError::Http(format!("Failed to fetch file: {}", e)))?;

    if !response.status().is_success() {
        return Err(AppError::Http(
            format!("Failed to fetch file. Status: {}", response.status())
        ));
    }

    if response.content_length().is_some_and(|len| len as usize > max_size) {
        return Err(AppError::InvalidInput(format!("File exceeds {} bytes", max_size)));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| AppError::Http(format!("Failed to read response bytes: {}", e)))?;

    if bytes.len() > max_size {
        return Err(AppError::InvalidInput(format!("File exceeds {} bytes", max_size)));
    }
    Ok(bytes)
}
