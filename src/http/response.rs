// HTTP response construction and serialization
use http::StatusCode;

pub const CORS_HEADERS: [(&str, &str); 3] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", "POST, OPTIONS"),
    ("Access-Control-Allow-Headers", "x-app-security-code, x-file-name, Content-Type"),
];

pub const UPLOAD_OK_BODY: &str = "File uploaded successfully!";

#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Every response starts with the CORS headers.
    fn with_cors(status: StatusCode) -> Self {
        let headers = CORS_HEADERS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        HttpResponse { status, headers, body: Vec::new() }
    }

    fn finish(mut self) -> Self {
        self.headers.push(("Content-Length".to_string(), self.body.len().to_string()));
        self.headers.push(("Connection".to_string(), "close".to_string()));
        self
    }

    pub fn preflight() -> Self {
        Self::with_cors(StatusCode::OK).finish()
    }

    pub fn error(status: StatusCode) -> Self {
        Self::with_cors(status).finish()
    }

    pub fn uploaded() -> Self {
        let mut r = Self::with_cors(StatusCode::OK);
        r.headers.push(("Content-Type".to_string(), "text/plain".to_string()));
        r.body = UPLOAD_OK_BODY.as_bytes().to_vec();
        r.finish()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let reason = self.status.canonical_reason().unwrap_or("Unknown");
        let mut o = format!("HTTP/1.1 {} {}\r\n", self.status.as_u16(), reason);
        for (k, v) in &self.headers {
            o.push_str(k);
            o.push_str(": ");
            o.push_str(v);
            o.push_str("\r\n");
        }
        o.push_str("\r\n");
        let mut b = o.into_bytes();
        b.extend_from_slice(&self.body);
        b
    }

    #[cfg(test)]
    pub fn get_header(&self, n: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(n))
            .map(|(_, v)| v.as_str())
    }
}
