use url::Url;

/// Format file size in human-readable format
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f = bytes as f64;
    let unit_index = (bytes_f.log10() / THRESHOLD.log10()).floor() as usize;
    let unit_index = unit_index.min(UNITS.len() - 1);

    let size = bytes_f / THRESHOLD.powi(unit_index as i32);

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

/// "2024-01-01" (or any separator) -> "20240101"
pub fn date_key(date: &str) -> String {
    date.chars().filter(char::is_ascii_digit).take(8).collect()
}

/// "20240101" or "2024-01-01" -> "2024.01.01"; anything else has dashes swapped for dots
pub fn dotted_date(date: &str) -> String {
    let raw = date.trim();
    let key = date_key(raw);
    let looks_like_date = (raw.len() == 8 && raw == key) || (raw.len() == 10 && key.len() == 8);
    if looks_like_date {
        format!("{}.{}.{}", &key[0..4], &key[4..6], &key[6..8])
    } else {
        raw.replace('-', ".")
    }
}

/// Extract domain from URL for display purposes
pub fn extract_domain(url: &str) -> Option<String> {
    Url::parse(url).ok()?.host_str().map(|host| {
        host.strip_prefix("www.").unwrap_or(host).to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1024), "1.0 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(1048576), "1.0 MB");
    }

    #[test]
    fn test_date_forms() {
        assert_eq!(date_key("2024-01-01"), "20240101");
        assert_eq!(dotted_date("20240101"), "2024.01.01");
        assert_eq!(dotted_date("2024-01-01"), "2024.01.01");
        assert_eq!(dotted_date("Jan-1"), "Jan.1");
        assert_eq!(dotted_date(""), "");
    }

    #[test]
    fn test_extract_domain() {
        assert_eq!(extract_domain("https://www.arirang.com/radio/132"), Some("arirang.com".to_string()));
        assert_eq!(extract_domain("https://v.kr.kollus.com/lstBUSaP"), Some("v.kr.kollus.com".to_string()));
        assert_eq!(extract_domain("invalid-url"), None);
    }
}
