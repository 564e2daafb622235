//! Sistema de logging do kernel
//!
//! Os níveis são selecionados em tempo de compilação pelas features
//! `no_logs`/`log_error`/`log_info`/`log_debug`/`log_trace`; chamadas
//! abaixo do nível mínimo são eliminadas pelo otimizador.

use core::fmt;

use crate::drivers::serial;

/// Nível de log
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

/// Nível mínimo compilado. `no_logs` desliga tudo (MIN_LEVEL acima de
/// qualquer nível real).
pub const MIN_LEVEL: u8 = if cfg!(feature = "no_logs") {
    255
} else if cfg!(feature = "log_error") {
    LogLevel::Warn as u8
} else if cfg!(feature = "log_trace") {
    LogLevel::Trace as u8
} else if cfg!(feature = "log_debug") {
    LogLevel::Debug as u8
} else {
    LogLevel::Info as u8
};

#[inline]
pub const fn enabled(level: LogLevel) -> bool {
    level as u8 >= MIN_LEVEL
}

/// Emite uma linha de log.
pub fn log(level: LogLevel, args: fmt::Arguments) {
    if !enabled(level) {
        return;
    }

    let prefix = match level {
        LogLevel::Trace => "[TRACE] ",
        LogLevel::Debug => "[DEBUG] ",
        LogLevel::Info => "[INFO]  ",
        LogLevel::Warn => "[WARN]  ",
        LogLevel::Error => "[ERROR] ",
    };

    serial::write_fmt(format_args!("{}{}\n", prefix, args));
}

// Macros de conveniência

#[macro_export]
macro_rules! ktrace {
    ($($arg:tt)*) => {
        $crate::debug::klog::log(
            $crate::debug::klog::LogLevel::Trace,
            format_args!($($arg)*),
        )
    };
}

#[macro_export]
macro_rules! kdebug {
    ($($arg:tt)*) => {
        $crate::debug::klog::log(
            $crate::debug::klog::LogLevel::Debug,
            format_args!($($arg)*),
        )
    };
}

#[macro_export]
macro_rules! kinfo {
    ($($arg:tt)*) => {
        $crate::debug::klog::log(
            $crate::debug::klog::LogLevel::Info,
            format_args!($($arg)*),
        )
    };
}

#[macro_export]
macro_rules! kwarn {
    ($($arg:tt)*) => {
        $crate::debug::klog::log(
            $crate::debug::klog::LogLevel::Warn,
            format_args!($($arg)*),
        )
    };
}

#[macro_export]
macro_rules! kerror {
    ($($arg:tt)*) => {
        $crate::debug::klog::log(
            $crate::debug::klog::LogLevel::Error,
            format_args!($($arg)*),
        )
    };
}
