//! Logging macros used throughout the crate.
//!
//! Every level funnels through `dispatch_log!`. With the "log" feature enabled the
//! message goes to the `log` crate; without it the arguments still reach
//! `format_args!()`, so log statements stay type checked either way.

#[cfg(feature = "log")]
#[allow(unused_macros)]
macro_rules! dispatch_log {
	($level:ident, $($args:tt)*) => {{
		::log::$level!($($args)*);
	}};
}

#[cfg(not(feature = "log"))]
#[allow(unused_macros)]
macro_rules! dispatch_log {
	($level:ident, $($args:tt)*) => {{
		format_args!($($args)*);
	}};
}

#[allow(unused_macros)]
macro_rules! trace {
	($($args:tt)*) => {
		dispatch_log!(trace, $($args)*)
	};
}

#[allow(unused_macros)]
macro_rules! debug {
	($($args:tt)*) => {
		dispatch_log!(debug, $($args)*)
	};
}

#[allow(unused_macros)]
macro_rules! info {
	($($args:tt)*) => {
		dispatch_log!(info, $($args)*)
	};
}

#[allow(unused_macros)]
macro_rules! warn {
	($($args:tt)*) => {
		dispatch_log!(warn, $($args)*)
	};
}

#[allow(unused_macros)]
macro_rules! error {
	($($args:tt)*) => {
		dispatch_log!(error, $($args)*)
	};
}
