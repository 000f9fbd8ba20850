mod common;

use baudrate_core::prelude::*;
use common::{MockPort, PortLog};
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn three_rates() -> CandidateTable {
    CandidateTable::from_rates(&[2400, 9600, 115200]).unwrap()
}

fn controller(mode: DetectionMode, policy: IndexPolicy) -> (CycleController<MockPort>, PortLog) {
    let (port, log) = MockPort::silent();
    let config = DetectionConfig {
        mode,
        index_policy: policy,
        ..Default::default()
    };
    (
        CycleController::new(&config, three_rates(), LinkHandle::new(port)),
        log,
    )
}

#[test]
fn test_start_applies_default_rate() {
    let (mut auto, log) = controller(DetectionMode::Auto, IndexPolicy::Wrap);
    assert_eq!(auto.phase(), CyclePhase::Idle);
    assert_eq!(auto.start(), 2);
    assert_eq!(auto.phase(), CyclePhase::Probing);
    assert_eq!(log.applied(), vec![115200]);

    // Starting twice does not re-apply
    auto.start();
    assert_eq!(log.applied(), vec![115200]);

    let (mut manual, _) = controller(DetectionMode::Manual, IndexPolicy::Wrap);
    manual.start();
    assert_eq!(manual.phase(), CyclePhase::Listening);
}

#[test]
fn test_timer_cycles_down_and_wraps() {
    let (mut ctl, log) = controller(DetectionMode::Auto, IndexPolicy::Wrap);
    ctl.start();

    let steps: Vec<Step> = (0..3).map(|_| ctl.handle(ControlEvent::Tick)).collect();
    assert_eq!(
        steps,
        vec![Step::Changed(1), Step::Changed(0), Step::Changed(2)]
    );
    assert_eq!(log.applied(), vec![115200, 9600, 2400, 115200]);
    assert_eq!(ctl.state().timeout_count, 3);
}

#[test]
fn test_timer_with_clamp_still_reapplies_at_bottom() {
    let (mut ctl, log) = controller(DetectionMode::Auto, IndexPolicy::Clamp);
    ctl.start();
    for _ in 0..4 {
        ctl.handle(ControlEvent::Tick);
    }
    assert_eq!(ctl.state().current_index, 0);
    assert_eq!(log.applied(), vec![115200, 9600, 2400, 2400, 2400]);
}

#[test]
fn test_confirmation_detects_current_index() {
    let (mut ctl, _) = controller(DetectionMode::Auto, IndexPolicy::Wrap);
    ctl.start();
    let epoch = ctl.epoch().get();
    assert_eq!(ctl.handle(ControlEvent::Confirmed { epoch }), Step::Finished);
    assert_eq!(ctl.phase(), CyclePhase::Detected);
    assert_eq!(ctl.state().current_index, 2);
    assert_eq!(ctl.current().label, "115200");
}

#[test]
fn test_stale_confirmation_is_ignored() {
    let (mut ctl, _) = controller(DetectionMode::Auto, IndexPolicy::Wrap);
    ctl.start();
    let old = ctl.epoch().get();
    ctl.handle(ControlEvent::Tick);
    assert_eq!(ctl.handle(ControlEvent::Confirmed { epoch: old }), Step::Continue);
    assert_eq!(ctl.phase(), CyclePhase::Probing);
}

#[test]
fn test_keys_drive_manual_mode_only() {
    let (mut manual, log) = controller(DetectionMode::Manual, IndexPolicy::Wrap);
    manual.start();
    assert_eq!(manual.handle(ControlEvent::Key(KeyGesture::Increase)), Step::Changed(0));
    assert_eq!(manual.handle(ControlEvent::Key(KeyGesture::Decrease)), Step::Changed(2));
    assert_eq!(manual.handle(ControlEvent::Tick), Step::Continue);
    assert_eq!(log.applied(), vec![115200, 2400, 115200]);

    let (mut auto, log) = controller(DetectionMode::Auto, IndexPolicy::Wrap);
    auto.start();
    assert_eq!(auto.handle(ControlEvent::Key(KeyGesture::Increase)), Step::Continue);
    assert_eq!(log.applied(), vec![115200]);
}

#[test]
fn test_manual_clamp_at_top_does_not_reapply() {
    let (mut ctl, log) = controller(DetectionMode::Manual, IndexPolicy::Clamp);
    ctl.start();
    assert_eq!(ctl.handle(ControlEvent::Key(KeyGesture::Increase)), Step::Continue);
    assert_eq!(log.applied(), vec![115200]);
}

#[test]
fn test_interrupt_from_any_phase() {
    for mode in [DetectionMode::Auto, DetectionMode::Manual] {
        let (mut idle, _) = controller(mode, IndexPolicy::Wrap);
        assert_eq!(idle.handle(ControlEvent::Interrupt), Step::Finished);
        assert_eq!(idle.phase(), CyclePhase::ShuttingDown);

        let (mut running, _) = controller(mode, IndexPolicy::Wrap);
        running.start();
        assert_eq!(running.handle(ControlEvent::Interrupt), Step::Finished);
        assert_eq!(running.phase(), CyclePhase::ShuttingDown);
        // Nothing moves once shutting down
        assert_eq!(running.handle(ControlEvent::Tick), Step::Finished);
    }
}

#[test]
fn test_apply_failure_keeps_cycling() {
    let (port, log) = MockPort::silent();
    let port = port.failing_apply();
    let mut ctl = CycleController::new(
        &DetectionConfig::default(),
        three_rates(),
        LinkHandle::new(port),
    );
    ctl.start();
    assert_eq!(ctl.handle(ControlEvent::Tick), Step::Changed(1));
    assert_eq!(log.applied(), vec![115200, 9600]);
}

#[test]
fn test_index_never_leaves_table() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for policy in [IndexPolicy::Wrap, IndexPolicy::Clamp] {
        for mode in [DetectionMode::Auto, DetectionMode::Manual] {
            let (mut ctl, _) = controller(mode, policy);
            ctl.start();
            for _ in 0..500 {
                let event = match rng.gen_range(0..3) {
                    0 => ControlEvent::Tick,
                    1 => ControlEvent::Key(KeyGesture::Increase),
                    _ => ControlEvent::Key(KeyGesture::Decrease),
                };
                ctl.handle(event);
                assert!(ctl.state().current_index < ctl.table().len());
            }
        }
    }
}

#[test]
fn test_every_change_advances_epoch() {
    let (mut ctl, _) = controller(DetectionMode::Manual, IndexPolicy::Wrap);
    ctl.start();
    let before = ctl.epoch().get();
    ctl.handle(ControlEvent::Key(KeyGesture::Decrease));
    assert_eq!(ctl.epoch().get(), before + 1);
}
