use super::*;

#[test]
fn default_options_have_unconstrained_target_and_exclude_sets() {
    let opts = DeploymentOptions::default();
    assert!(opts.targets.is_unconstrained());
    assert!(opts.excludes.is_unconstrained());
}

#[test]
fn default_options_run_in_full_apply_mode() {
    let opts = DeploymentOptions::default();
    assert!(!opts.refresh);
    assert!(!opts.refresh_only);
    assert!(!opts.preview_only);
    assert!(!opts.continue_on_error);
    assert_eq!(opts.parallel, 0);
}

#[test]
fn target_options_carries_target_and_exclude_sets_through() {
    let mut opts = DeploymentOptions { targets: TargetSet::new(["a", "b"]), ..Default::default() };
    opts.target_dependents = true;
    let target_options = opts.target_options();
    assert!(!target_options.targets.is_unconstrained());
    assert!(target_options.target_dependents);
    assert!(target_options.excludes.is_unconstrained());
}
