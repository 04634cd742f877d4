#[macro_export]
macro_rules! debug_log {
	($($arg:tt)*) => {{
		#[cfg(debug_assertions)]
		{
			eprintln!($($arg)*);
		}
	}};
}

pub mod config;
pub mod language;
pub mod span;
pub mod balancer;
pub mod structured;
pub mod pattern;
pub mod token_scan;
pub mod dispatch;
pub mod scanner;
pub mod report;
