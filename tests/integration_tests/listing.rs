use crate::common::{Workspace, workspace};
use insta::assert_snapshot;
use rstest::rstest;

fn config_with_short_names(ws: &Workspace) {
    ws.add_repo("alpha");
    ws.add_repo("beta");
    ws.write_config(
        r#"
[defaults]
fetch = false

[repos.beta]
path = "beta"
short-name = "b"

[repos.alpha]
path = "alpha"
short-name = "a"
ignore = true
"#,
    );
}

#[rstest]
fn test_list_names_in_config_order(workspace: Workspace) {
    config_with_short_names(&workspace);
    assert_snapshot!(workspace.stdout(&["--list-names"]), @r"
    beta
    alpha
    ");
}

#[rstest]
fn test_list_paths(workspace: Workspace) {
    config_with_short_names(&workspace);
    assert_snapshot!(workspace.stdout(&["--list-paths"]), @r"
    [ROOT]/beta
    [ROOT]/alpha
    ");
}

#[rstest]
fn test_list_paths_behind(workspace: Workspace) {
    let alpha = workspace.add_repo("alpha");
    let bare = workspace.add_remote(&alpha, "alpha.git");
    let beta = workspace.add_repo("beta");
    workspace.add_remote(&beta, "beta.git");

    workspace.git(
        workspace.root(),
        &["clone", "-q", bare.to_str().unwrap(), "other"],
    );
    let other = workspace.root().join("other");
    workspace.commit(&other, "theirs.txt", "theirs");
    workspace.git(&other, &["push", "-q", "origin", "main"]);

    workspace.write_config(
        r#"
[repos.alpha]
path = "alpha"

[repos.beta]
path = "beta"
"#,
    );

    assert_snapshot!(workspace.stdout(&["--list-paths", "--behind", "-j", "2"]), @"[ROOT]/alpha");
}

#[rstest]
fn test_get_dir_by_name_or_short_name(workspace: Workspace) {
    config_with_short_names(&workspace);
    assert_snapshot!(workspace.stdout(&["--get-dir", "beta"]), @"[ROOT]/beta");
    assert_snapshot!(workspace.stdout(&["--get-dir", "a"]), @"[ROOT]/alpha");
}

#[rstest]
fn test_get_dir_unknown(workspace: Workspace) {
    config_with_short_names(&workspace);
    let output = workspace
        .repos()
        .args(["-F", "repos.toml", "--get-dir", "nope"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no repository named 'nope'"), "{stderr}");
}

#[rstest]
fn test_shell_for_unknown_repo(workspace: Workspace) {
    config_with_short_names(&workspace);
    workspace
        .repos()
        .args(["-F", "repos.toml", "-r", "nope"])
        .assert()
        .failure()
        .code(1);
}

#[rstest]
fn test_shell_runs_in_repo(workspace: Workspace) {
    config_with_short_names(&workspace);
    // A non-interactive shell reading its commands from stdin
    let output = workspace
        .repos()
        .env("SHELL", "/bin/sh")
        .args(["-F", "repos.toml", "-r", "b"])
        .write_stdin("pwd\necho \"ctx=$REPOS_CONTEXT\"\nexit 3\n")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));
    let stdout = workspace.normalize(&String::from_utf8_lossy(&output.stdout));
    assert_snapshot!(stdout, @r"
    [ROOT]/beta
    ctx=[ROOT]/beta
    ");
    let stderr = workspace.normalize(&String::from_utf8_lossy(&output.stderr));
    assert!(stderr.contains("Starting new shell in [ROOT]/beta"), "{stderr}");
}

#[rstest]
fn test_generate_config_round_trip(workspace: Workspace) {
    workspace.add_repo("beta");
    workspace.add_repo("alpha");
    std::fs::create_dir(workspace.root().join("not-a-repo")).unwrap();

    let output = workspace
        .repos()
        .arg("--generate-config")
        .output()
        .unwrap();
    assert!(output.status.success());
    let generated = String::from_utf8(output.stdout).unwrap();

    let parsed: toml::Table = toml::from_str(&generated).unwrap();
    let repos = parsed["repos"].as_table().unwrap();
    assert_eq!(repos.keys().collect::<Vec<_>>(), ["alpha", "beta"]);

    std::fs::write(workspace.root().join("repos.toml"), &generated).unwrap();
    assert_snapshot!(workspace.stdout(&["--list-paths"]), @r"
    [ROOT]/alpha
    [ROOT]/beta
    ");
}

#[rstest]
fn test_generate_config_without_repos(workspace: Workspace) {
    let output = workspace
        .repos()
        .arg("--generate-config")
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no git repositories found"), "{stderr}");
}

#[rstest]
fn test_recent_commits(workspace: Workspace) {
    let alpha = workspace.add_repo("alpha");
    workspace.commit_now(&alpha, "today.txt", "fresh");
    // Only commits dated 2025, far outside the window
    workspace.add_repo("beta");
    workspace.write_config(
        r#"
[repos.alpha]
path = "alpha"

[repos.beta]
path = "beta"
"#,
    );

    let output = workspace.stdout(&["--recent", "--days", "2"]);
    let lines: Vec<_> = output.lines().collect();
    assert_eq!(lines.len(), 2, "{output}");
    assert_eq!(lines[0], "alpha");
    assert!(lines[1].starts_with("    "));
    assert!(lines[1].ends_with("Test User: update today.txt"), "{output}");
}

#[rstest]
fn test_recent_ignored_needs_noignore(workspace: Workspace) {
    let alpha = workspace.add_repo("alpha");
    workspace.commit_now(&alpha, "today.txt", "fresh");
    workspace.write_config("[repos.alpha]\npath = \"alpha\"\nignore = true\n");

    assert_eq!(workspace.stdout(&["--recent"]), "");

    let output = workspace.stdout(&["--recent", "--noignore"]);
    assert_eq!(output.lines().next(), Some("alpha"), "{output}");
}

#[rstest]
fn test_list_paths_behind_does_not_fetch_ignored(workspace: Workspace) {
    let alpha = workspace.add_repo("alpha");
    let missing = workspace.root().join("missing.git");
    workspace.git(&alpha, &["remote", "add", "origin", missing.to_str().unwrap()]);
    workspace.add_repo("beta");
    workspace.write_config(
        r#"
[repos.alpha]
path = "alpha"
ignore = true

[repos.beta]
path = "beta"
"#,
    );

    let run = |extra: &[&str]| {
        let output = workspace
            .repos()
            .args(["-F", "repos.toml", "--list-paths", "--behind"])
            .args(extra)
            .output()
            .unwrap();
        assert!(output.status.success());
        assert!(output.stdout.is_empty());
        String::from_utf8_lossy(&output.stderr).into_owned()
    };

    let stderr = run(&[]);
    assert!(!stderr.contains("alpha"), "{stderr}");

    // Fetching from the missing remote fails once the repo is included
    let stderr = run(&["--noignore"]);
    assert!(stderr.contains("alpha: fetch failed"), "{stderr}");
}
