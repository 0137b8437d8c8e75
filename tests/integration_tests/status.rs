use crate::common::{Workspace, row, workspace};
use rstest::rstest;
use serde_json::Value;

/// alpha has an unstaged edit, beta untracked files, gamma nothing.
fn three_repos(ws: &Workspace) {
    let alpha = ws.add_repo("alpha");
    std::fs::write(alpha.join("README.md"), "changed\n").unwrap();

    let beta = ws.add_repo("beta");
    std::fs::write(beta.join("notes.txt"), "todo\n").unwrap();
    std::fs::create_dir(beta.join("build")).unwrap();
    std::fs::write(beta.join("build/out.o"), "").unwrap();

    ws.add_repo("gamma");
    ws.write_config(
        r#"
[repos.alpha]
path = "alpha"
comment = "the first one"

[repos.beta]
path = "beta"

[repos.gamma]
path = "gamma"
"#,
    );
}

#[rstest]
fn test_status_shows_only_repos_needing_attention(workspace: Workspace) {
    three_repos(&workspace);
    let table = workspace.stdout(&["--no-fetch", "-j", "3"]);

    let header = table.lines().next().unwrap();
    assert_eq!(
        header.split_whitespace().collect::<Vec<_>>(),
        ["REPO", "REMOTE", "STATE", "STAGED", "UNSTAGED", "UNTRACKED", "TSLC", "COMMENT"]
    );
    assert_eq!(
        row(&table, "alpha").unwrap(),
        ["alpha", "Unknown", "(", "1f,", "+1", ",-1", ")", "5", "Hours", "the", "first", "one"]
    );
    assert_eq!(
        row(&table, "beta").unwrap(),
        ["beta", "Unknown", "1d,1f", "5", "Hours"]
    );
    assert_eq!(row(&table, "gamma"), None);
    assert_eq!(table.lines().count(), 3);
}

#[rstest]
fn test_status_all_includes_clean_repos(workspace: Workspace) {
    three_repos(&workspace);
    let table = workspace.stdout(&["--no-fetch", "--all"]);

    assert_eq!(
        row(&table, "gamma").unwrap(),
        ["gamma", "Unknown", "5", "Hours"]
    );
    assert_eq!(table.lines().count(), 4);
}

#[rstest]
fn test_status_staged_changes(workspace: Workspace) {
    let alpha = workspace.add_repo("alpha");
    std::fs::write(alpha.join("lib.rs"), "fn a() {}\nfn b() {}\n").unwrap();
    workspace.git(&alpha, &["add", "lib.rs"]);
    workspace.write_config("[repos.alpha]\npath = \"alpha\"\n");

    let table = workspace.stdout(&["--no-fetch"]);
    assert_eq!(
        row(&table, "alpha").unwrap(),
        ["alpha", "Unknown", "(", "1f,", "+2", ",-0", ")", "5", "Hours"]
    );
}

#[rstest]
fn test_status_branch_column(workspace: Workspace) {
    let alpha = workspace.add_repo("alpha");
    workspace.git(&alpha, &["checkout", "-q", "-b", "feature/x"]);
    std::fs::write(alpha.join("new.txt"), "").unwrap();
    workspace.write_config("[repos.alpha]\npath = \"alpha\"\n");

    let table = workspace.stdout(&["--no-fetch", "--branch"]);
    assert!(table.lines().next().unwrap().contains("BRANCH"));
    assert_eq!(
        row(&table, "alpha").unwrap(),
        ["alpha", "feature/x", "Unknown", "0d,1f", "5", "Hours"]
    );
}

#[rstest]
fn test_status_json(workspace: Workspace) {
    three_repos(&workspace);
    let output = workspace.stdout(&["--no-fetch", "-j", "2", "--output-format", "json"]);
    let json: Value = serde_json::from_str(&output).unwrap();
    let repos = json.as_array().unwrap();

    // Every repository, sorted by name, regardless of state
    let names: Vec<_> = repos
        .iter()
        .map(|r| r["config"]["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["alpha", "beta", "gamma"]);

    let alpha = &repos[0];
    assert_eq!(alpha["config"]["path"], "[ROOT]/alpha");
    assert_eq!(alpha["state"]["dirty"], true);
    assert_eq!(
        alpha["state"]["unstaged"],
        serde_json::json!({"files": 1, "insertions": 1, "deletions": 1})
    );
    assert_eq!(alpha["state"]["seconds_since_last_commit"], 5 * 3600);
    assert_eq!(
        alpha["state"]["remote_state"],
        serde_json::json!({"state": "unknown", "ahead": null, "behind": null})
    );
    assert_eq!(alpha["error"], Value::Null);

    assert_eq!(
        repos[1]["state"]["untracked"],
        serde_json::json!({"files": 1, "dirs": 1})
    );
}

#[rstest]
fn test_text_output_has_no_ansi(workspace: Workspace) {
    three_repos(&workspace);
    let table = workspace.stdout(&["--no-fetch", "--output-format", "text"]);
    assert!(!table.contains('\u{1b}'), "{table}");
}

#[rstest]
fn test_ahead_of_upstream(workspace: Workspace) {
    let alpha = workspace.add_repo("alpha");
    workspace.add_remote(&alpha, "alpha.git");
    workspace.commit(&alpha, "one.txt", "1");
    workspace.commit(&alpha, "two.txt", "2");
    workspace.write_config("[repos.alpha]\npath = \"alpha\"\n");

    let table = workspace.stdout(&[]);
    assert_eq!(
        row(&table, "alpha").unwrap(),
        ["alpha", "Ahead", "+2", "5", "Hours"]
    );
}

#[rstest]
fn test_fetch_reveals_behind_and_diverged(workspace: Workspace) {
    let alpha = workspace.add_repo("alpha");
    let bare = workspace.add_remote(&alpha, "alpha.git");

    // Someone else pushes a commit
    workspace.git(
        workspace.root(),
        &["clone", "-q", bare.to_str().unwrap(), "other"],
    );
    let other = workspace.root().join("other");
    workspace.commit(&other, "theirs.txt", "theirs");
    workspace.git(&other, &["push", "-q", "origin", "main"]);

    workspace.write_config("[repos.alpha]\npath = \"alpha\"\n");

    // Without fetching, the local view of the upstream is stale
    let table = workspace.stdout(&["--no-fetch", "--all"]);
    assert_eq!(row(&table, "alpha").unwrap(), ["alpha", "5", "Hours"]);

    let table = workspace.stdout(&[]);
    assert_eq!(
        row(&table, "alpha").unwrap(),
        ["alpha", "Behind", "-1", "5", "Hours"]
    );

    workspace.commit(&alpha, "mine.txt", "mine");
    let table = workspace.stdout(&[]);
    assert_eq!(
        row(&table, "alpha").unwrap(),
        ["alpha", "Diverged", "+1-1", "5", "Hours"]
    );
}

#[rstest]
fn test_ignored_repo_hides_remote_state_unless_noignore(workspace: Workspace) {
    let alpha = workspace.add_repo("alpha");
    workspace.add_remote(&alpha, "alpha.git");
    workspace.commit(&alpha, "one.txt", "1");
    workspace.write_config("[repos.alpha]\npath = \"alpha\"\nignore = true\n");

    let table = workspace.stdout(&["--no-fetch"]);
    assert_eq!(row(&table, "alpha"), None);

    let table = workspace.stdout(&["--no-fetch", "--noignore"]);
    assert!(row(&table, "alpha").is_some());
}

#[rstest]
fn test_missing_repository_reports_error_and_continues(workspace: Workspace) {
    workspace.add_repo("alpha");
    workspace.write_config(
        r#"
[repos.alpha]
path = "alpha"

[repos.ghost]
path = "does-not-exist"
"#,
    );

    let output = workspace
        .repos()
        .args(["-F", "repos.toml", "--no-fetch", "--all"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(row(&stdout, "alpha").is_some());
    assert!(row(&stdout, "ghost").is_some());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("ghost: reading last commit time failed"),
        "{stderr}"
    );
}

#[rstest]
fn test_single_path(workspace: Workspace) {
    let alpha = workspace.add_repo("alpha");
    std::fs::write(alpha.join("README.md"), "changed\n").unwrap();

    let output = workspace
        .repos()
        .args(["--no-fetch", "--path"])
        .arg(&alpha)
        .output()
        .unwrap();
    assert!(output.status.success());
    let table = workspace.normalize(&String::from_utf8_lossy(&output.stdout));
    assert_eq!(table.lines().count(), 2);
    assert_eq!(
        row(&table, "[ROOT]/alpha").unwrap(),
        ["[ROOT]/alpha", "Unknown", "(", "1f,", "+1", ",-1", ")", "5", "Hours"]
    );
}

#[rstest]
fn test_single_path_json(workspace: Workspace) {
    let alpha = workspace.add_repo("alpha");
    let output = workspace
        .repos()
        .args(["--no-fetch", "--output-format", "json", "--path"])
        .arg(&alpha)
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["state"]["dirty"], false);
}
