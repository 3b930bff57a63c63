use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::EnvConfig;

pub const DEFAULT_FILTER: &str = "hookflow=info,warn";
pub const DEBUG_FILTER: &str = "hookflow=debug,info";

/// 日志配置
pub struct LoggingConfig;

impl LoggingConfig {
    /// 初始化日志系统
    ///
    /// - RUST_LOG: 优先使用
    /// - HOOKFLOW_DEBUG: 未设置 RUST_LOG 时打开调试输出，并显示文件和行号
    ///
    /// 已经初始化过时返回 false。
    ///
    /// ```no_run
    /// use hookflow::utils::LoggingConfig;
    ///
    /// LoggingConfig::init();
    /// ```
    pub fn init() -> bool {
        let is_debug = Self::is_debug();
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(Self::fallback_filter(is_debug)));

        let fmt_layer = fmt::layer()
            .with_target(is_debug)
            .with_file(is_debug)
            .with_line_number(is_debug)
            .with_thread_ids(is_debug);

        let installed = tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .is_ok();

        if installed && is_debug {
            tracing::debug!("调试模式已启用");
        }
        installed
    }

    /// 使用自定义过滤器初始化
    pub fn init_with_filter(filter: &str) -> bool {
        tracing_subscriber::registry()
            .with(EnvFilter::new(filter))
            .with(fmt::layer().with_target(false))
            .try_init()
            .is_ok()
    }

    pub fn is_debug() -> bool {
        EnvConfig::is_debug_mode()
    }

    fn fallback_filter(is_debug: bool) -> &'static str {
        if is_debug {
            DEBUG_FILTER
        } else {
            DEFAULT_FILTER
        }
    }
}
