use std::io::Write;

/// 按 Info 级别初始化全局日志
pub fn init_log() {
    init_log_with_filter(log::LevelFilter::Info);
}

/// 按指定级别初始化全局日志
///
/// 重复初始化会 panic，测试中请使用 [`try_init_log_with_filter`]
pub fn init_log_with_filter(filter: log::LevelFilter) {
    log_builder(filter).init();
}

/// 和 [`init_log_with_filter`] 相同，但已经初始化过时直接返回 false
pub fn try_init_log_with_filter(filter: log::LevelFilter) -> bool {
    log_builder(filter).try_init().is_ok()
}

/// 将配置文件中的字符串解析为日志级别，无法识别时回退到 Info
pub fn parse_level_filter(level: &str) -> log::LevelFilter {
    level.trim().parse().unwrap_or_else(|_| {
        eprintln!("unknown log level '{level}', fallback to info");
        log::LevelFilter::Info
    })
}

fn log_builder(filter: log::LevelFilter) -> env_logger::Builder {
    let mut builder = env_logger::Builder::new();
    builder
        .format(|buf, record| {
            let info_style = buf
                .default_level_style(log::Level::Info)
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green)));
            let warn_style = buf
                .default_level_style(log::Level::Warn)
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow)));
            let error_style = buf
                .default_level_style(log::Level::Error)
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red)));

            let level_style = match record.level() {
                log::Level::Info => info_style,
                log::Level::Warn => warn_style,
                log::Level::Error => error_style,
                _ => buf.default_level_style(record.level()),
            };
            let grey_style = info_style.fg_color(Some(anstyle::Color::Rgb(anstyle::RgbColor(110, 110, 110))));
            let dim_style = info_style.fg_color(Some(anstyle::Color::Rgb(anstyle::RgbColor(75, 75, 75))));

            // 节点图日志按模块区分来源，文件名只保留最后一段
            let target = record.target().rsplit("::").next().unwrap_or("");
            let line = record.line().unwrap_or(!0);
            let file = record.file().unwrap_or("").rsplit(['/', '\\']).next().unwrap_or("");
            let time = chrono::Local::now().format("%H:%M:%S%.3f");
            let level = record.level();

            writeln!(
                buf,
                "{level_style}[{time}] {level:<5}{level_style:#} {grey_style}[{target}|{file}:{line}]{grey_style:#} \
                 {dim_style}{}{dim_style:#}",
                record.args()
            )
        })
        .filter(None, filter);
    builder
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level_filter() {
        assert_eq!(parse_level_filter("debug"), log::LevelFilter::Debug);
        assert_eq!(parse_level_filter(" WARN "), log::LevelFilter::Warn);
        assert_eq!(parse_level_filter("off"), log::LevelFilter::Off);
        assert_eq!(parse_level_filter("loud"), log::LevelFilter::Info);
    }

    #[test]
    fn test_try_init_twice() {
        let _ = try_init_log_with_filter(log::LevelFilter::Trace);
        // 第二次初始化必然失败，但不能 panic
        assert!(!try_init_log_with_filter(log::LevelFilter::Trace));
    }
}
