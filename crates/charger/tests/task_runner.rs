//! The periodic tasks under a real executor: attach arms them, `run` drives
//! them, suspend stops them and resume brings them back.
//!
//! Run with: cargo test -p charger --test task_runner

mod common;

use charger::registers::{REG01_POWER_ON_CONFIG, WD_RESET_MASK};
use common::Rig;
use embassy_futures::select::{select, Either};
use embassy_time::{Duration, Timer};

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

#[tokio::test]
async fn run_drives_ticks_until_suspend() {
    let rig = Rig::new();
    let c = rig.attach();
    rig.notifier.reset();
    rig.bus.clear_log();

    let script = async {
        Timer::after(ms(50)).await;
        let kicked = rig
            .bus
            .writes_to(REG01_POWER_ON_CONFIG)
            .iter()
            .any(|v| v & WD_RESET_MASK != 0);
        let beats = rig.notifier.count();

        c.suspend().await;
        rig.bus.clear_log();
        Timer::after(ms(50)).await;
        let while_suspended = rig.bus.transaction_count();

        c.resume();
        Timer::after(ms(50)).await;
        (kicked, beats, while_suspended, rig.bus.transaction_count())
    };

    match select(c.run(), script).await {
        Either::First(never) => never,
        Either::Second((kicked, beats, while_suspended, after_resume)) => {
            assert!(kicked, "heartbeat never kicked the watchdog");
            assert!(beats >= 1);
            assert_eq!(while_suspended, 0);
            assert!(after_resume > 0);
        }
    }
}

#[tokio::test]
async fn gauge_update_triggers_immediate_heartbeat() {
    let rig = Rig::new();
    let c = rig.attach();

    let script = async {
        // Let the attach-time ticks run, then go quiet.
        Timer::after(ms(30)).await;
        rig.notifier.reset();
        Timer::after(ms(30)).await;
        let idle = rig.notifier.count();

        c.heartbeat_kick().gauge_updated();
        Timer::after(ms(30)).await;
        (idle, rig.notifier.count())
    };

    match select(c.run(), script).await {
        Either::First(never) => never,
        Either::Second((idle, after_kick)) => {
            assert_eq!(idle, 0);
            assert_eq!(after_kick, 1);
        }
    }
}

#[tokio::test]
async fn heartbeat_override_shortens_the_period() {
    let rig = Rig::new();
    let c = rig.attach();
    c.heartbeat_kick().set_period_override_ms(500);

    let script = async {
        Timer::after(ms(30)).await;
        rig.notifier.reset();
        Timer::after(ms(1100)).await;
        rig.notifier.count()
    };

    match select(c.run(), script).await {
        Either::First(never) => never,
        Either::Second(beats) => assert!(beats >= 2, "only {beats} beats"),
    }
}
