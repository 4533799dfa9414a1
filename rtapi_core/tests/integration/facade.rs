//! Integration test: the `Rtapi` facade end to end.
//!
//! Validates: configuration drives the message level and stash size; tasks
//! exchange state through shared memory; deferred messages are rendered
//! after each tick, translated and filtered; segment refcounts survive
//! task deletion.

use rtapi_common::config::RtapiConfig;
use rtapi_common::error::RtapiError;
use rtapi_common::level::MsgLevel;
use rtapi_core::clock::ManualClock;
use rtapi_core::rtapi::Rtapi;
use rtapi_core::task::{Resumption, TaskEntry, prio_highest, prio_lowest, prio_next_lower, task_self, wait};
use rtapi_shmem::HeapProvider;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::AtomicBool;

const CONFIG_TOML: &str = r#"
[scheduler]
base_period_ns = 500000

[messages]
level = "dbg"
stash_capacity = 256

[[tasks]]
name = "producer"
period_ns = 500000
shmem_key = 0x7001
"#;

type Log = Rc<RefCell<Vec<(MsgLevel, String)>>>;

fn runtime(config: &RtapiConfig) -> (Rtapi<ManualClock, HeapProvider>, Log) {
    let log: Log = Rc::default();
    let sink = log.clone();
    let rtapi = Rtapi::new(ManualClock::new(0), HeapProvider::new(), config).with_handler(
        move |level: MsgLevel, text: &str| sink.borrow_mut().push((level, text.to_owned())),
    );
    (rtapi, log)
}

#[test]
fn producer_and_consumer_share_a_segment() {
    let config: RtapiConfig = toml::from_str(CONFIG_TOML).unwrap();
    config.validate().unwrap();
    let (mut rtapi, log) = runtime(&config);
    assert_eq!(rtapi.get_msg_level(), MsgLevel::Dbg);
    rtapi.clock_set_period(config.scheduler.base_period_ns).unwrap();

    let key = config.tasks[0].shmem_key.unwrap();
    let seg_p = rtapi.shmem_new(key, 8).unwrap();
    let seg_c = rtapi.shmem_new(key, 8).unwrap();
    assert_eq!(seg_p, seg_c);
    assert_eq!(rtapi.shmem_refcount(seg_p).unwrap(), 2);
    assert_eq!(rtapi.shmem_size(seg_p).unwrap(), 8);

    let cell = rtapi.shmem_getptr(seg_p).unwrap().cast::<u64>();
    let producer = rtapi
        .task_new(
            TaskEntry::from_step(
                move |n: &mut u64| {
                    *n += 1;
                    unsafe { cell.write_volatile(*n) };
                    Resumption::Yielded
                },
                0,
            ),
            prio_highest(),
            1,
            0,
        )
        .unwrap();

    let msg = rtapi.messenger();
    let seen = rtapi.shmem_getptr(seg_c).unwrap().cast::<u64>();
    let consumer = rtapi
        .task_new(
            TaskEntry::from_async(
                move |()| async move {
                    loop {
                        let v = unsafe { seen.read_volatile() };
                        msg.print_msg(MsgLevel::Dbg, "seen %lu\n", &[v.into()]).unwrap();
                        wait().await;
                    }
                },
                (),
            ),
            prio_next_lower(prio_highest()),
            1,
            0,
        )
        .unwrap();

    rtapi.task_start(producer, 500_000).unwrap();
    rtapi.task_start(consumer, 1_000_000).unwrap();

    let running = AtomicBool::new(true);
    assert_eq!(rtapi.run(&running, Some(5)).unwrap(), 5);

    // Producer runs first in each shared tick.
    let texts: Vec<String> = log.borrow().iter().map(|(_, t)| t.clone()).collect();
    assert_eq!(texts, ["seen 1\n", "seen 3\n", "seen 5\n"]);

    rtapi.task_delete(producer).unwrap();
    rtapi.task_delete(consumer).unwrap();
    rtapi.shmem_delete(seg_c).unwrap();
    assert!(rtapi.shmem_getptr(seg_p).is_ok());
    rtapi.shmem_delete(seg_p).unwrap();
    assert!(matches!(
        rtapi.shmem_getptr(seg_p),
        Err(RtapiError::InvalidArgument(_))
    ));
    assert!(rtapi.shmem_registry().is_empty());
}

#[test]
fn full_stash_drops_and_recovers() {
    let config: RtapiConfig = toml::from_str(CONFIG_TOML).unwrap();
    let (mut rtapi, log) = runtime(&config);

    let mut stored = 0;
    loop {
        match rtapi.print("message number %d with some padding text\n", &[stored.into()]) {
            Ok(()) => stored += 1,
            Err(RtapiError::OutOfSpace { .. }) => break,
            Err(e) => panic!("unexpected error {e}"),
        }
    }
    assert!(stored > 0);
    assert_eq!(rtapi.messenger().dropped().unwrap(), 1);

    assert_eq!(rtapi.flush().unwrap(), stored as usize);
    assert_eq!(log.borrow().len(), stored as usize);
    assert_eq!(log.borrow()[0].0, MsgLevel::All);
    rtapi.print("after\n", &[]).unwrap();
}

#[test]
fn catalog_translates_on_flush() {
    let (mut rtapi, log) = runtime(&RtapiConfig::default());
    let catalog: HashMap<String, String> = [
        ("axis %s homed\n", "Achse %s referenziert\n"),
        ("X", "X-Achse"),
        // Different argument types: must not be used.
        ("count %d\n", "Anzahl %s\n"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_owned(), v.to_owned()))
    .collect();
    rtapi.set_catalog(catalog).unwrap();

    rtapi.print_msg(MsgLevel::Info, "axis %s homed\n", &["X".into()]).unwrap();
    rtapi.print_msg(MsgLevel::Warn, "count %d\n", &[3.into()]).unwrap();
    rtapi.flush().unwrap();

    assert_eq!(
        *log.borrow(),
        [
            (MsgLevel::Info, "Achse X-Achse referenziert\n".to_owned()),
            (MsgLevel::Warn, "count 3\n".to_owned()),
        ]
    );
}

#[test]
fn level_none_silences_print_msg_only() {
    let (mut rtapi, log) = runtime(&RtapiConfig::default());
    rtapi.set_msg_level(MsgLevel::None).unwrap();
    rtapi.print_msg(MsgLevel::Err, "boom\n", &[]).unwrap();
    rtapi.print("plain\n", &[]).unwrap();
    rtapi.flush().unwrap();
    assert_eq!(*log.borrow(), [(MsgLevel::All, "plain\n".to_owned())]);
    assert_eq!(MsgLevel::try_from(9).ok(), None);
}

#[test]
fn task_lifecycle_errors() {
    let (mut rtapi, _) = runtime(&RtapiConfig::default());
    let idle = || TaskEntry::from_step(|_: &mut ()| Resumption::Yielded, ());

    let id = rtapi.task_new(idle(), prio_lowest(), 1, 0).unwrap();
    assert!(matches!(
        rtapi.task_start(id, 1_000_000),
        Err(RtapiError::InvalidArgument(_))
    ));
    assert!(matches!(
        rtapi.task_new(idle(), prio_lowest() + 1, 1, 0),
        Err(RtapiError::InvalidArgument(_))
    ));

    rtapi.clock_set_period(1_000_000).unwrap();
    assert!(rtapi.clock_set_period(2_000_000).is_err());
    assert_eq!(rtapi.clock_set_period(0).unwrap(), 1_000_000);

    rtapi.task_start(id, 1_000_000).unwrap();
    assert!(matches!(rtapi.task_pause(id), Err(RtapiError::NotImplemented(_))));
    assert!(matches!(rtapi.task_resume(id), Err(RtapiError::NotImplemented(_))));
    rtapi.task_set_period(id, 5_000_000).unwrap();
    assert_eq!(rtapi.task_info(id).unwrap().ratio, 5);

    rtapi.task_stop(id).unwrap();
    assert!(rtapi.task_info(id).is_err());
    assert!(rtapi.task_delete(id).is_err());
}

#[test]
fn task_self_identifies_the_running_task() {
    let (mut rtapi, _) = runtime(&RtapiConfig::default());
    rtapi.clock_set_period(1_000_000).unwrap();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    let id = rtapi
        .task_new(
            TaskEntry::from_step(
                move |_: &mut ()| {
                    sink.borrow_mut().push(task_self());
                    Resumption::Yielded
                },
                (),
            ),
            3,
            1,
            0,
        )
        .unwrap();
    rtapi.task_start(id, 1_000_000).unwrap();
    rtapi.step().unwrap();
    rtapi.step().unwrap();
    assert_eq!(*seen.borrow(), [Some(id), Some(id)]);
    assert_eq!(task_self(), None);
}
