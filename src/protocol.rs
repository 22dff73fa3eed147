//! The transport-agnostic wire protocol: JSON requests/responses carrying
//! the POSIX filesystem verbs, with `buf` fields base64-encoded on the wire.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

/// The fixed set of operation names the dispatcher understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    Getattr,
    Readdir,
    Opendir,
    Releasedir,
    Open,
    Read,
    Write,
    Release,
    Truncate,
    Readlink,
    Unlink,
    Mknod,
}

/// An incoming request. Operation-specific scalar fields (`offset`, `size`,
/// `buf`, ...) are kept as a raw JSON object so the dispatcher can merge
/// them with bound path variables before invoking a handler.
#[derive(Clone, Debug, Deserialize)]
pub struct Request {
    pub id: u64,
    pub op: Op,
    pub path: String,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, Value>,
}

impl Request {
    /// Decodes the request's `buf` field (if present) from base64 into raw
    /// bytes, per the wire contract in §6.
    pub fn decoded_buf(&self) -> Result<Option<Vec<u8>>, Error> {
        match self.fields.get("buf") {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(STANDARD.decode(s)?)),
            Some(_) => Err(Error::InvalidBody("buf field is not a string".into())),
        }
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.fields.get(key).and_then(Value::as_u64)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.fields.get(key).and_then(Value::as_i64)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }
}

/// An outgoing response: either a successful, operation-specific result, or
/// an error carrying a POSIX errno.
#[derive(Clone, Debug)]
pub enum Response {
    Ok { op: Op, id: u64, fields: serde_json::Map<String, Value> },
    Err { op: Op, id: u64, errno: i32 },
}

impl Response {
    pub fn ok(op: Op, id: u64, fields: serde_json::Map<String, Value>) -> Self {
        Response::Ok { op, id, fields }
    }

    pub fn err(op: Op, id: u64, errno: i32) -> Self {
        Response::Err { op, id, errno }
    }

    /// Builds a response carrying raw bytes under `buf`, base64-encoding
    /// them for the wire.
    pub fn with_buf(op: Op, id: u64, buf: &[u8]) -> Self {
        let mut fields = serde_json::Map::new();
        fields.insert("buf".to_string(), Value::String(STANDARD.encode(buf)));
        Response::Ok { op, id, fields }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Response::Ok { op, id, fields } => {
                let mut map = fields.clone();
                map.insert("op".to_string(), serde_json::to_value(op).unwrap());
                map.insert("id".to_string(), Value::from(*id));
                Value::Object(map)
            }
            Response::Err { op, id, errno } => {
                serde_json::json!({ "op": op, "id": id, "error": errno })
            }
        }
    }
}

/// `{st_mode, st_nlink, st_size}` per §6.
pub mod mode {
    pub const S_IFREG: u32 = 0o100000;
    pub const S_IFDIR: u32 = 0o040000;
    pub const S_IFLNK: u32 = 0o120000;
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct Attr {
    pub st_mode: u32,
    pub st_nlink: u32,
    pub st_size: u64,
}

impl Attr {
    pub fn into_fields(self) -> serde_json::Map<String, Value> {
        let mut m = serde_json::Map::new();
        m.insert("st_mode".into(), Value::from(self.st_mode));
        m.insert("st_nlink".into(), Value::from(self.st_nlink));
        m.insert("st_size".into(), Value::from(self.st_size));
        m
    }
}

/// `{entries: [name, ...]}` per §6, always starting with `.` and `..`.
pub fn dir_entries(children: impl IntoIterator<Item = String>) -> serde_json::Map<String, Value> {
    let mut entries = vec![".".to_string(), "..".to_string()];
    entries.extend(children);
    let mut m = serde_json::Map::new();
    m.insert("entries".into(), Value::from(entries));
    m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_decodes_base64_buf() {
        let json = serde_json::json!({
            "id": 1,
            "op": "write",
            "path": "/a",
            "buf": STANDARD.encode("hello"),
        });
        let req: Request = serde_json::from_value(json).unwrap();
        assert_eq!(req.decoded_buf().unwrap(), Some(b"hello".to_vec()));
    }

    #[test]
    fn response_err_shape() {
        let r = Response::err(Op::Getattr, 7, libc::ENOENT);
        let v = r.to_json();
        assert_eq!(v["error"], libc::ENOENT);
        assert_eq!(v["id"], 7);
    }

    #[test]
    fn dir_entries_start_with_dot_and_dotdot() {
        let fields = dir_entries(vec!["c".to_string(), "d".to_string()]);
        assert_eq!(fields["entries"], serde_json::json!([".", "..", "c", "d"]));
    }
}
