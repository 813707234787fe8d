//! Recognized environment variables. None are required: the core functions
//! with every variable absent, using the in-memory drivers.

/// Snapshot of the logging-related environment variables, read once at
/// startup by `rivetkit_runtime::logging::init`.
#[derive(Debug, Clone)]
pub struct LogEnv {
	pub log_level: Option<String>,
	pub log_target: bool,
	pub log_timestamp: bool,
	pub inspector_token: Option<String>,
}

impl LogEnv {
	pub fn from_env() -> Self {
		Self {
			log_level: std::env::var("LOG_LEVEL").ok(),
			log_target: env_flag("LOG_TARGET"),
			log_timestamp: env_flag("LOG_TIMESTAMP"),
			inspector_token: std::env::var("RIVETKIT_INSPECTOR_TOKEN").ok(),
		}
	}
}

fn env_flag(name: &str) -> bool {
	std::env::var(name).map(|x| x == "1").unwrap_or(false)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn absent_env_has_safe_defaults() {
		// SAFETY: no other test in this crate touches these variables.
		unsafe {
			std::env::remove_var("LOG_LEVEL");
			std::env::remove_var("LOG_TARGET");
			std::env::remove_var("LOG_TIMESTAMP");
			std::env::remove_var("RIVETKIT_INSPECTOR_TOKEN");
		}
		let env = LogEnv::from_env();
		assert!(env.log_level.is_none());
		assert!(!env.log_target);
		assert!(!env.log_timestamp);
		assert!(env.inspector_token.is_none());
	}
}
