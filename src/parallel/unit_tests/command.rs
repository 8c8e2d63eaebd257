use crate::parallel::{command::CommandSpec, error::ParallelError};

fn expect_invalid(spec: CommandSpec) {
    match spec.validate() {
        Err(ParallelError::InvalidConfiguration(_)) => {}
        other => panic!("unexpected result for {:?}: {:?}", spec, other),
    }
}

#[test]
fn builder() {
    let spec = CommandSpec::new("cargo")
        .args(["build", "--release"])
        .working_dir("/home/user/project")
        .env([("RUST_LOG", "debug"), ("CARGO_TARGET_DIR", "target")])
        .process_group(true);

    assert_eq!(spec.program, "cargo");
    assert_eq!(spec.args, vec!["build", "--release"]);
    assert_eq!(spec.working_dir.as_deref(), Some("/home/user/project"));
    let env = spec.env.as_ref().unwrap();
    assert_eq!(env.get("RUST_LOG").map(String::as_str), Some("debug"));
    assert_eq!(env.get("CARGO_TARGET_DIR").map(String::as_str), Some("target"));
    assert!(spec.process_group);
}

#[test]
fn display_joins_program_and_args() {
    assert_eq!(CommandSpec::new("true").to_string(), "true");
    assert_eq!(
        CommandSpec::new("sh").args(["-c", "exit 1"]).to_string(),
        "sh -c exit 1"
    );
}

#[test]
fn validation() {
    assert!(CommandSpec::new("echo").args(["hello"]).validate().is_ok());
    // Empty arguments are legitimate values for many programs.
    assert!(CommandSpec::new("echo").args([""]).validate().is_ok());
    // Existence is checked at start, not during validation.
    assert!(CommandSpec::new("/nonexistent/program").validate().is_ok());

    expect_invalid(CommandSpec::new(""));
    expect_invalid(CommandSpec::new(" echo"));
    expect_invalid(CommandSpec::new("echo\0"));
    expect_invalid(CommandSpec::new("echo").args(["a\0b"]));
    expect_invalid(CommandSpec::new("echo").working_dir("/tmp\0"));
    expect_invalid(CommandSpec::new("echo").env([("", "value")]));
    expect_invalid(CommandSpec::new("echo").env([("KEY=1", "value")]));
    expect_invalid(CommandSpec::new("echo").env([("KEY", "va\0lue")]));
}

#[test]
fn deserialize_with_defaults() {
    let spec: CommandSpec = serde_json::from_str(r#"{"program":"ls"}"#).unwrap();
    assert_eq!(spec, CommandSpec::new("ls"));

    let spec: CommandSpec =
        serde_json::from_str(r#"{"program":"ls","args":["-la"],"process_group":true}"#).unwrap();
    assert_eq!(spec, CommandSpec::new("ls").args(["-la"]).process_group(true));
}
