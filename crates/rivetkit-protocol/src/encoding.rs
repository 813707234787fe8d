use rivetkit_error::RivetkitError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wire format used for a connection or the persisted record.
///
/// `Bare` is preferred for persistence (size + the built-in version byte);
/// `Cbor` is the fallback when a driver can't carry raw binary cleanly; `Json`
/// is the universal default for browser clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
	Json,
	Cbor,
	Bare,
}

impl Encoding {
	pub fn as_str(&self) -> &'static str {
		match self {
			Encoding::Json => "json",
			Encoding::Cbor => "cbor",
			Encoding::Bare => "bare",
		}
	}

	pub fn parse(s: &str) -> Result<Self, RivetkitError> {
		match s {
			"json" => Ok(Encoding::Json),
			"cbor" => Ok(Encoding::Cbor),
			"bare" => Ok(Encoding::Bare),
			other => Err(RivetkitError::Unsupported {
				feature: format!("encoding '{other}'"),
			}),
		}
	}
}

impl fmt::Display for Encoding {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
