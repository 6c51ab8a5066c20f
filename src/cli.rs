use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use clap::{value_parser, Arg, ArgMatches, Command};
use crm_config::LogFormat;

/// 解析后的子命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    /// 启动通知引擎
    Run,
    AddPerson {
        first_name: String,
        last_name: Option<String>,
        second_name: Option<String>,
    },
    Schedule {
        person_id: i64,
        at: DateTime<Utc>,
        description: String,
    },
    List {
        person_id: i64,
    },
}

#[derive(Debug, Clone)]
pub struct CliArgs {
    pub config_path: Option<String>,
    /// 命令行指定时覆盖配置文件中的日志设置
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub command: CliCommand,
}

pub fn build_cli() -> Command {
    Command::new("personal-crm")
        .version(env!("CARGO_PKG_VERSION"))
        .about("个人关系管理系统 - 保持联系提醒引擎")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径")
                .global(true),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .global(true),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式")
                .value_parser(["json", "pretty"])
                .global(true),
        )
        .subcommand(Command::new("run").about("启动通知引擎（默认）"))
        .subcommand(
            Command::new("add-person")
                .about("新增联系人")
                .arg(
                    Arg::new("first-name")
                        .long("first-name")
                        .value_name("NAME")
                        .required(true),
                )
                .arg(Arg::new("last-name").long("last-name").value_name("NAME"))
                .arg(
                    Arg::new("second-name")
                        .long("second-name")
                        .value_name("NAME"),
                ),
        )
        .subcommand(
            Command::new("schedule")
                .about("为联系人安排一条保持联系提醒")
                .arg(
                    Arg::new("person-id")
                        .long("person-id")
                        .value_name("ID")
                        .value_parser(value_parser!(i64))
                        .required(true),
                )
                .arg(
                    Arg::new("at")
                        .long("at")
                        .value_name("TIME")
                        .help("RFC3339 时间或 now")
                        .default_value("now"),
                )
                .arg(
                    Arg::new("description")
                        .long("description")
                        .value_name("TEXT")
                        .default_value(""),
                ),
        )
        .subcommand(
            Command::new("list")
                .about("列出联系人的提醒")
                .arg(
                    Arg::new("person-id")
                        .long("person-id")
                        .value_name("ID")
                        .value_parser(value_parser!(i64))
                        .required(true),
                ),
        )
}

impl CliArgs {
    pub fn from_matches(matches: &ArgMatches, now: DateTime<Utc>) -> Result<Self> {
        let log_format = matches
            .get_one::<String>("log-format")
            .map(|format| format.parse::<LogFormat>())
            .transpose()?;

        let command = match matches.subcommand() {
            None | Some(("run", _)) => CliCommand::Run,
            Some(("add-person", sub)) => CliCommand::AddPerson {
                first_name: required_string(sub, "first-name")?,
                last_name: sub.get_one::<String>("last-name").cloned(),
                second_name: sub.get_one::<String>("second-name").cloned(),
            },
            Some(("schedule", sub)) => {
                let at = required_string(sub, "at")?;
                CliCommand::Schedule {
                    person_id: required_id(sub)?,
                    at: parse_schedule_time(&at, now)?,
                    description: sub
                        .get_one::<String>("description")
                        .cloned()
                        .unwrap_or_default(),
                }
            }
            Some(("list", sub)) => CliCommand::List {
                person_id: required_id(sub)?,
            },
            Some((other, _)) => return Err(anyhow!("未知的子命令: {other}")),
        };

        Ok(Self {
            config_path: matches.get_one::<String>("config").cloned(),
            log_level: matches.get_one::<String>("log-level").cloned(),
            log_format,
            command,
        })
    }
}

/// `now` 或 RFC3339 时间，统一转换为 UTC
pub fn parse_schedule_time(value: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    if value.eq_ignore_ascii_case("now") {
        return Ok(now);
    }
    DateTime::parse_from_rfc3339(value)
        .map(|time| time.with_timezone(&Utc))
        .with_context(|| format!("无法解析提醒时间: {value}"))
}

fn required_string(matches: &ArgMatches, name: &str) -> Result<String> {
    matches
        .get_one::<String>(name)
        .cloned()
        .ok_or_else(|| anyhow!("缺少参数: --{name}"))
}

fn required_id(matches: &ArgMatches) -> Result<i64> {
    matches
        .get_one::<i64>("person-id")
        .copied()
        .ok_or_else(|| anyhow!("缺少参数: --person-id"))
}
