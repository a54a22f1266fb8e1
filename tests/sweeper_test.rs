mod helpers;

use std::collections::BTreeSet;

use anyhow::Result;
use rsocistrap::capability::{Capabilities, Capability};
use rsocistrap::find::{self, FindBackend, SpecialFileSweeper};

use helpers::{Call, MockEngine, working_container};

const FIND_OUTPUT: &str = "/usr/bin/passwd\n/usr/bin/su\n/usr/bin/mount\n/usr/sbin/unix_chkpwd\n";

fn sweeper(backend: FindBackend) -> SpecialFileSweeper {
    SpecialFileSweeper::new(find::new_command_factory(backend).expect("known backend"))
}

fn excludes(paths: &[&str]) -> BTreeSet<String> {
    paths.iter().map(|p| p.to_string()).collect()
}

#[test]
fn test_chmod_receives_all_paths_not_excluded() -> Result<()> {
    let engine = MockEngine::new().with_stdout("find", FIND_OUTPUT);
    let container = working_container(&engine);
    sweeper(FindBackend::Gnu).unset_special_bits(&container, &excludes(&["/usr/bin/su"]))?;

    let runs = engine.runs();
    assert_eq!(runs.len(), 2);
    let Call::Run {
        argv, capabilities, ..
    } = &runs[1]
    else {
        panic!("expected a run call");
    };
    assert_eq!(
        argv,
        &vec!["chmod", "-s", "/usr/bin/passwd", "/usr/bin/mount", "/usr/sbin/unix_chkpwd"]
    );
    assert_eq!(
        *capabilities,
        Capabilities::from([Capability::DacReadSearch, Capability::Fowner])
    );
    Ok(())
}

#[test]
fn test_no_chmod_when_everything_is_excluded() -> Result<()> {
    let engine = MockEngine::new().with_stdout("find", FIND_OUTPUT);
    let container = working_container(&engine);
    let all = excludes(&["/usr/bin/passwd", "/usr/bin/su", "/usr/bin/mount", "/usr/sbin/unix_chkpwd"]);
    sweeper(FindBackend::BusyBox).unset_special_bits(&container, &all)?;

    assert_eq!(engine.run_argvs().len(), 1);
    assert_eq!(engine.run_argvs()[0][0], "find");
    Ok(())
}

#[test]
fn test_no_chmod_when_nothing_is_found() -> Result<()> {
    let engine = MockEngine::new();
    let container = working_container(&engine);
    sweeper(FindBackend::Bsd).unset_special_bits(&container, &BTreeSet::new())?;
    assert_eq!(engine.run_argvs().len(), 1);
    Ok(())
}

#[test]
fn test_excludes_match_exact_paths_only() -> Result<()> {
    let engine = MockEngine::new().with_stdout("find", "/usr/bin/su\n/usr/bin/sudo\n");
    let container = working_container(&engine);
    sweeper(FindBackend::Gnu).unset_special_bits(&container, &excludes(&["/usr/bin/su"]))?;

    assert_eq!(engine.run_argvs()[1], vec!["chmod", "-s", "/usr/bin/sudo"]);
    Ok(())
}

#[test]
fn test_find_failure_is_reported() {
    let engine = MockEngine::new().with_failing("find");
    let container = working_container(&engine);
    let err = sweeper(FindBackend::Gnu)
        .unset_special_bits(&container, &BTreeSet::new())
        .unwrap_err();
    assert_eq!(err.to_string(), "searching for special files using GNU find");
}

#[test]
fn test_crlf_output_keeps_paths_intact() -> Result<()> {
    let engine = MockEngine::new().with_stdout("find", "/usr/bin/su\r\n/opt/app/run tool \r\n/usr/bin/mount\r\n");
    let container = working_container(&engine);
    sweeper(FindBackend::Gnu).unset_special_bits(&container, &excludes(&["/usr/bin/su"]))?;

    assert_eq!(
        engine.run_argvs()[1],
        vec!["chmod", "-s", "/opt/app/run tool ", "/usr/bin/mount"]
    );
    Ok(())
}
