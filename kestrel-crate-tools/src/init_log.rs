use std::io::Write;

use anstyle::{AnsiColor, Color, RgbColor, Style};

/// 以 Info 为默认等级初始化日志，`RUST_LOG` 可以覆盖
pub fn init_log() {
    init_log_with_level(log::LevelFilter::Info);
}

/// 初始化全局 logger
///
/// 输出格式：`[时间] 等级 [文件:行号] 内容`，不同等级使用不同颜色。
/// 重复调用只会输出一条警告，不会 panic。
pub fn init_log_with_level(default_level: log::LevelFilter) {
    let result = env_logger::Builder::new()
        .filter(None, default_level)
        .parse_default_env()
        .format(|buf, record| {
            let level_style = level_style(record.level());
            let grey_style = Style::new().fg_color(Some(Color::Rgb(RgbColor(110, 110, 110))));

            let line = record.line().unwrap_or(!0);
            // windows 与 unix 的路径分隔符都需要处理
            let file = record.file().unwrap_or("").rsplit(['\\', '/']).next().unwrap_or("");
            let time = chrono::Local::now().format("%H:%M:%S%.3f");
            let level = record.level();

            writeln!(
                buf,
                "{level_style}[{time}] {level:<5}{level_style:#} {grey_style}[{file}:{line}]{grey_style:#} {}",
                record.args()
            )
        })
        .try_init();

    if result.is_err() {
        log::warn!("logger has already been initialized");
    }
}

fn level_style(level: log::Level) -> Style {
    let color = match level {
        log::Level::Error => AnsiColor::Red,
        log::Level::Warn => AnsiColor::Yellow,
        log::Level::Info => AnsiColor::Green,
        log::Level::Debug => AnsiColor::Blue,
        log::Level::Trace => AnsiColor::BrightBlack,
    };
    Style::new().fg_color(Some(Color::Ansi(color)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_log_twice() {
        init_log_with_level(log::LevelFilter::Debug);
        init_log();
        log::info!("logger ready");
    }

    #[test]
    fn test_level_style_is_colored() {
        for level in [log::Level::Error, log::Level::Warn, log::Level::Info, log::Level::Debug, log::Level::Trace] {
            assert!(level_style(level).get_fg_color().is_some());
        }
    }
}
