// Upload request descriptor parsed from the header block
const SECURITY_HEADER: &str = "x-app-security-code:";
const FILE_NAME_HEADER: &str = "x-file-name:";
const CONTENT_LENGTH_HEADER: &str = "content-length:";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadRequest {
    pub method: String,
    pub security_code: Option<String>,
    pub file_name: Option<String>,
    /// 0 when absent, unparsable or out of range. Only trusted as a byte count when > 0.
    pub content_length: i64,
}

impl UploadRequest {
    /// Line-oriented scan for the three recognized headers. Everything else
    /// is ignored and the last occurrence of a header wins.
    pub fn parse(head: &[u8]) -> Self {
        let t = String::from_utf8_lossy(head);
        let method = t.split_whitespace().next().unwrap_or_default().to_string();
        let mut req = UploadRequest { method, ..Default::default() };

        for ln in t.split(['\r', '\n']).filter(|l| !l.is_empty()) {
            if let Some(v) = header_value(ln, SECURITY_HEADER) {
                req.security_code = Some(v.to_string());
            } else if let Some(v) = header_value(ln, FILE_NAME_HEADER) {
                req.file_name = Some(v.to_string());
            } else if let Some(v) = header_value(ln, CONTENT_LENGTH_HEADER) {
                req.content_length = leading_int(v);
            }
        }
        req
    }
}

fn header_value<'a>(ln: &'a str, prefix: &str) -> Option<&'a str> {
    let p = ln.get(..prefix.len())?;
    if !p.eq_ignore_ascii_case(prefix) { return None; }
    Some(ln[prefix.len()..].trim_start())
}

/// Optional sign plus the run of leading ASCII digits; anything after the
/// digits is ignored, so `13abc` reads as 13. Overflow yields 0.
pub fn leading_int(v: &str) -> i64 {
    let v = v.trim_start();
    let (neg, rest) = match v.as_bytes().first() {
        Some(b'-') => (true, &v[1..]),
        Some(b'+') => (false, &v[1..]),
        _ => (false, v),
    };
    let end = rest.bytes().position(|b| !b.is_ascii_digit()).unwrap_or(rest.len());
    let Ok(n) = rest[..end].parse::<i64>() else { return 0 };
    if neg { -n } else { n }
}
