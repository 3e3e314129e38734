//! ---
//! gh_section: "03-persistence-logging"
//! gh_subsection: "module"
//! gh_type: "source"
//! gh_scope: "code"
//! gh_description: "Structured logging adapters and sinks."
//! gh_version: "v0.1.0"
//! gh_owner: "tbd"
//! ---
//! Context-enriched logging macros.

#[doc(hidden)]
#[macro_export]
macro_rules! __gh_event {
    ($level:expr, $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            $level,
            preset = ctx.preset.unwrap_or(""),
            tick = ctx.tick.unwrap_or_default(),
            weather = ctx.weather.unwrap_or(""),
            mode = ctx.mode.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit an informational log enriched with simulation context.
#[macro_export]
macro_rules! gh_info {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__gh_event!(tracing::Level::INFO, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__gh_event!(tracing::Level::INFO, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a debug log enriched with simulation context.
#[macro_export]
macro_rules! gh_debug {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__gh_event!(tracing::Level::DEBUG, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__gh_event!(tracing::Level::DEBUG, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a warning enriched with simulation context.
#[macro_export]
macro_rules! gh_warn {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__gh_event!(tracing::Level::WARN, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__gh_event!(tracing::Level::WARN, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit an error log enriched with simulation context.
#[macro_export]
macro_rules! gh_error {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__gh_event!(tracing::Level::ERROR, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__gh_event!(tracing::Level::ERROR, $crate::LogContext::default(), $($arg)+)
    };
}
