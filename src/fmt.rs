//! Logging shims.
//!
//! Each macro forwards to `log` or `defmt` depending on the enabled feature. With
//! neither enabled the arguments are still borrowed so call sites never produce
//! unused-variable warnings.

#![macro_use]
#![allow(unused_macros)]

macro_rules! log_at {
    ($level:ident, $s:literal $(, $x:expr)* $(,)?) => {
        {
            cfg_if::cfg_if! {
                if #[cfg(feature = "log")] {
                    ::log::$level!($s $(, $x)*);
                } else if #[cfg(feature = "defmt")] {
                    ::defmt::$level!($s $(, $x)*);
                } else {
                    let _ = ($( & $x ),*);
                }
            }
        }
    };
}

macro_rules! trace {
    ($s:literal $(, $x:expr)* $(,)?) => { log_at!(trace, $s $(, $x)*) };
}

macro_rules! debug {
    ($s:literal $(, $x:expr)* $(,)?) => { log_at!(debug, $s $(, $x)*) };
}

macro_rules! info {
    ($s:literal $(, $x:expr)* $(,)?) => { log_at!(info, $s $(, $x)*) };
}

macro_rules! warn {
    ($s:literal $(, $x:expr)* $(,)?) => { log_at!(warn, $s $(, $x)*) };
}

macro_rules! error {
    ($s:literal $(, $x:expr)* $(,)?) => { log_at!(error, $s $(, $x)*) };
}
