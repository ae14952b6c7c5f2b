//! Structured command replies
//!
//! Command handlers only build [`Reply`] values. Turning them into RESP bytes
//! happens in [`Reply::encode`].

/// One reply in the RESP2 model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `+text`
    Status(String),
    /// `-text`
    Error(String),
    /// `:n`
    Integer(i64),
    /// `$len` payload, or `$-1` for null
    Bulk(Option<Vec<u8>>),
    /// `*len` followed by each element
    MultiBulk(Vec<Reply>),
}

impl Reply {
    pub fn ok() -> Self {
        Reply::Status("OK".to_string())
    }

    pub fn status(text: impl Into<String>) -> Self {
        Reply::Status(text.into())
    }

    pub fn error(text: impl Into<String>) -> Self {
        Reply::Error(text.into())
    }

    pub fn null() -> Self {
        Reply::Bulk(None)
    }

    pub fn bulk(data: impl Into<Vec<u8>>) -> Self {
        Reply::Bulk(Some(data.into()))
    }

    /// Multi-bulk reply of plain byte-string fields
    pub fn fields(fields: impl IntoIterator<Item = Vec<u8>>) -> Self {
        Reply::MultiBulk(fields.into_iter().map(|f| Reply::Bulk(Some(f))).collect())
    }

    /// Append the RESP encoding of this reply to `buf`
    pub fn encode(&self, buf: &mut Vec<u8>) {
        match self {
            Reply::Status(text) => {
                buf.push(b'+');
                push_line(buf, text.as_bytes());
            }
            Reply::Error(text) => {
                buf.push(b'-');
                push_line(buf, text.as_bytes());
            }
            Reply::Integer(n) => {
                buf.push(b':');
                push_line(buf, n.to_string().as_bytes());
            }
            Reply::Bulk(None) => buf.extend_from_slice(b"$-1\r\n"),
            Reply::Bulk(Some(data)) => {
                buf.push(b'$');
                push_line(buf, data.len().to_string().as_bytes());
                buf.extend_from_slice(data);
                buf.extend_from_slice(b"\r\n");
            }
            Reply::MultiBulk(items) => {
                buf.push(b'*');
                push_line(buf, items.len().to_string().as_bytes());
                for item in items {
                    item.encode(buf);
                }
            }
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode(&mut buf);
        buf
    }
}

/// Status and error text must stay on one line
fn push_line(buf: &mut Vec<u8>, line: &[u8]) {
    buf.extend(line.iter().map(|&b| if b == b'\r' || b == b'\n' { b' ' } else { b }));
    buf.extend_from_slice(b"\r\n");
}
