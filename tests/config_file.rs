// tests/config_file.rs
use asthra_bot::config::{load_file_default, load_file_from, BotConfig, ENV_CONFIG_PATH};
use std::{env, fs};

const SAMPLE: &str = r#"
[source]
homepage_url = "https://www.livemint.com/"
timeout_secs = 8

[schedule]
fetch_interval_secs = 600
quiet_threshold_secs = 7200
publish_failure_notices = false

[telegram]
commands_enabled = false
"#;

#[test]
fn parse_explicit_path() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("bot.toml");
    fs::write(&p, SAMPLE).unwrap();

    let file = load_file_from(&p).unwrap();
    assert_eq!(file.source.timeout_secs, 8);
    assert_eq!(file.schedule.fetch_interval_secs, 600);
    assert!(!file.schedule.publish_failure_notices);
    // untouched sections keep defaults
    assert_eq!(file.schedule.item_delay_secs, 15);
    assert_eq!(file.summarizer.max_retries, 2);
    assert!(!file.telegram.commands_enabled);
}

#[test]
fn broken_toml_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("bot.toml");
    fs::write(&p, "[schedule\nfetch_interval_secs = ").unwrap();
    let err = load_file_from(&p).unwrap_err();
    assert!(format!("{err:#}").contains("parsing bot config"));
}

#[serial_test::serial]
#[test]
fn default_uses_env_then_fallback() {
    // Isolate CWD so the repository's own config/ is not picked up.
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    env::remove_var(ENV_CONFIG_PATH);

    // 1) Nothing on disk → defaults
    let file = load_file_default().unwrap();
    assert_eq!(file.schedule.fetch_interval_secs, 900);

    // 2) ./config/bot.toml
    fs::create_dir_all(tmp.path().join("config")).unwrap();
    fs::write(tmp.path().join("config/bot.toml"), SAMPLE).unwrap();
    let file = load_file_default().unwrap();
    assert_eq!(file.schedule.fetch_interval_secs, 600);

    // 3) Env path wins
    let p_env = tmp.path().join("other.toml");
    fs::write(&p_env, "[schedule]\nfetch_interval_secs = 60\n").unwrap();
    env::set_var(ENV_CONFIG_PATH, p_env.display().to_string());
    let file = load_file_default().unwrap();
    assert_eq!(file.schedule.fetch_interval_secs, 60);

    // 4) Env path that does not exist is fatal
    env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.toml").display().to_string());
    assert!(load_file_default().is_err());

    env::remove_var(ENV_CONFIG_PATH);
    env::set_current_dir(&old).unwrap();
}

#[test]
fn file_values_flow_into_bot_config() {
    let file = toml::from_str(SAMPLE).unwrap();
    let cfg = BotConfig::from_parts(file, |k| match k {
        "GROQ_API_KEY" => Some("gsk".into()),
        "BOT_TOKEN" => Some("1:x".into()),
        "CHANNEL_ID" => Some("@asthra".into()),
        "QUIET_THRESHOLD_SECS" => Some("10800".into()),
        _ => None,
    })
    .unwrap();
    assert_eq!(cfg.schedule.fetch_interval_secs, 600);
    assert_eq!(cfg.schedule.quiet_threshold_secs, 10_800);
    assert_eq!(cfg.credentials.channel_id, "@asthra");
}
