/// Base URL of the open platform API.
pub const API_BASE_URL: &str = "https://proapi.115.com";

/// Base URL of the passport service (token refresh).
pub const PASSPORT_BASE_URL: &str = "https://passportapi.115.com";

/// Number of leading bytes covered by the prefix digest (128 KiB).
pub const PREHASH_SIZE: u64 = 128 * 1024;

/// Default listing page size.
pub const DEFAULT_PAGE_SIZE: i64 = 200;

/// Largest page size the listing endpoint accepts.
pub const MAX_PAGE_SIZE: i64 = 1150;

/// Folder id of the account root.
pub const ROOT_FOLDER_ID: &str = "0";

/// `fc` value marking a folder in listings.
pub const CATEGORY_FOLDER: &str = "0";

/// `fc` value marking a file in listings.
pub const CATEGORY_FILE: &str = "1";

/// User agent sent to the download URL endpoint when the caller has none.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// API error codes meaning the access token must be refreshed.
pub const TOKEN_EXPIRED_CODES: &[i64] = &[40140123, 40140124, 40140125, 40140126];

/// Returns `true` if `code` signals an expired or invalid access token.
pub fn is_token_expired(code: i64) -> bool {
    TOKEN_EXPIRED_CODES.contains(&code)
}

/// Formats a folder id as the upload `target` field.
pub fn upload_target(folder_id: &str) -> String {
    format!("U_1_{folder_id}")
}
