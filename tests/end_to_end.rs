//! Daemon behaviour over the simulated bus and an in-memory link

use approx::assert_relative_eq;
use rosc::{OscBundle, OscMessage, OscPacket, OscTime, OscType};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;
use trill_osc::app::Bridge;
use trill_osc::command::Controller;
use trill_osc::config::{BusConfig, BusType, Config, PollingConfig};
use trill_osc::core::types::{DeviceType, Mode, PollPolicy};
use trill_osc::devices::create_bus;
use trill_osc::devices::mock::{MockBus, VirtualSensor};
use trill_osc::streaming::{OscPaths, osc};
use trill_osc::transport::MockLink;

struct Harness {
    bus: MockBus,
    link: MockLink,
    bridge: Bridge<MockLink>,
}

impl Harness {
    fn new(root: &str) -> Self {
        let bus = MockBus::new();
        bus.attach(1, 0x20, VirtualSensor::new(DeviceType::Bar));
        bus.attach(1, 0x25, VirtualSensor::new(DeviceType::Square));
        let link = MockLink::new();
        let controller = Controller::new(Box::new(bus.clone()), false, Duration::ZERO);
        let bridge = Bridge::new(
            controller,
            link.clone(),
            OscPaths::new(root),
            &PollingConfig::default(),
            Arc::new(AtomicBool::new(true)),
        );
        Self { bus, link, bridge }
    }

    fn send(&mut self, addr: &str, args: Vec<OscType>) {
        let datagram = osc::encode(OscMessage {
            addr: addr.to_string(),
            args,
        })
        .unwrap();
        self.link.inject(datagram);
    }

    fn received(&self) -> Vec<OscMessage> {
        self.link
            .take_sent()
            .iter()
            .flat_map(|d| osc::decode(d).unwrap())
            .collect()
    }
}

fn s(v: &str) -> OscType {
    OscType::String(v.to_string())
}

fn f(v: f32) -> OscType {
    OscType::Float(v)
}

#[test]
fn create_all_list_all_delete_all() {
    let mut h = Harness::new("/trill");

    h.send("/trill/command/createAll", vec![f(1.0)]);
    h.bridge.cycle();
    let replies = h.received();
    assert_eq!(replies.len(), 2);
    assert!(replies.iter().all(|m| m.addr == "/trill/commandreply/new"));
    assert_eq!(replies[0].args[0], s("1-32-bar"));
    assert_eq!(replies[1].args[0], s("1-37-square"));

    h.send("/trill/command/listAll", vec![]);
    h.bridge.cycle();
    let replies = h.received();
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0].addr, "/trill/commandreply/list");
    assert_eq!(
        replies[0].args,
        vec![s("1-32-bar"), s("bar"), f(32.0), s("centroid")]
    );
    assert_eq!(
        replies[1].args,
        vec![s("1-37-square"), s("square"), f(37.0), s("centroid")]
    );

    h.send("/trill/command/deleteAll", vec![]);
    h.bridge.cycle();
    assert!(h.received().is_empty());
    assert!(h.bridge.controller().registry().is_empty());
}

#[test]
fn auto_read_streams_every_cycle() {
    let mut h = Harness::new("/trill");
    h.send("/trill/command/autoReadAll", vec![f(1.0)]);
    h.send(
        "/trill/command/new",
        vec![s("bar"), OscType::Int(1), s("bar")],
    );
    h.bridge.cycle();
    assert_eq!(h.received().len(), 1);

    h.bus.press(1, 0x20, &[(0.25, 0.5), (0.75, 0.25)]);
    h.bridge.cycle();
    h.bridge.cycle();

    let readings = h.received();
    assert_eq!(readings.len(), 2);
    let args = &readings[1].args;
    assert_eq!(readings[1].addr, "/trill/readings/bar/touches");
    assert_eq!(args.len(), 5);
    assert_eq!(args[0], f(2.0));
    match (&args[1], &args[4]) {
        (OscType::Float(loc), OscType::Float(size)) => {
            assert_relative_eq!(*loc, 0.25, epsilon = 1e-3);
            assert_relative_eq!(*size, 0.25, epsilon = 1e-3);
        }
        other => panic!("unexpected args {:?}", other),
    }
}

#[test]
fn read_once_then_stop() {
    let mut h = Harness::new("/trill");
    h.send("/trill/command/new", vec![s("sq"), f(1.0), s("unknown"), f(37.0)]);
    h.send("/trill/command/readI2C", vec![s("sq")]);
    h.bridge.cycle();
    assert_eq!(h.received().len(), 1);

    h.bus.press(1, 0x25, &[(0.5, 0.5)]);
    h.bridge.cycle();
    let readings = h.received();
    assert_eq!(readings.len(), 1);
    assert_eq!(readings[0].addr, "/trill/readings/sq/touchXY");
    assert_eq!(readings[0].args[0], f(1.0));

    h.bridge.cycle();
    assert!(h.received().is_empty());
    assert_eq!(
        h.bridge.controller().registry().get("sq").unwrap().poll_policy(),
        PollPolicy::Never
    );
}

#[test]
fn set_mode_changes_reading_format() {
    let mut h = Harness::new("/trill");
    h.send("/trill/command/new", vec![s("b"), f(1.0), s("bar")]);
    h.send("/trill/command/setMode", vec![s("b"), s("diff")]);
    h.send("/trill/command/autoRead", vec![s("b"), f(1.0)]);
    h.bridge.cycle();

    let replies = h.received();
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[1].addr, "/trill/commandreply/setMode");
    assert_eq!(replies[1].args, vec![s("b"), f(0.0)]);
    assert_eq!(h.bus.mode(1, 0x20), Some(Mode::Diff));

    h.bus.press(1, 0x20, &[(0.5, 1.0)]);
    h.bridge.cycle();
    let readings = h.received();
    assert_eq!(readings.len(), 1);
    assert_eq!(readings[0].addr, "/trill/readings/b/diff");
    assert_eq!(readings[0].args.len(), 26);
}

#[test]
fn set_mode_wrong_arity_is_ignored() {
    let mut h = Harness::new("/trill");
    h.send("/trill/command/new", vec![s("b"), f(1.0), s("bar")]);
    h.send("/trill/command/setMode", vec![s("b")]);
    h.send("/trill/command/setMode", vec![s("b"), s("raw"), s("diff")]);
    h.bridge.cycle();

    assert_eq!(h.received().len(), 1);
    assert_eq!(
        h.bridge.controller().registry().get("b").unwrap().mode(),
        Mode::Centroid
    );
}

#[test]
fn new_unknown_type_without_address_is_rejected() {
    let mut h = Harness::new("/trill");
    h.send("/trill/command/new", vec![s("u"), f(1.0), s("unknown")]);
    h.bridge.cycle();
    assert!(h.received().is_empty());
    assert!(h.bridge.controller().registry().is_empty());

    h.send("/trill/command/new", vec![s("u"), f(1.0), s("unknown"), f(32.0)]);
    h.bridge.cycle();
    let replies = h.received();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].args[1], s("bar"));
}

#[test]
fn device_failure_replies_minus_one() {
    let mut h = Harness::new("/trill");
    h.send("/trill/command/new", vec![s("b"), f(1.0), s("bar")]);
    h.bridge.cycle();
    h.received();

    h.bus.set_offline(1, 0x20, true);
    h.send("/trill/command/updateBaseline", vec![s("b")]);
    h.bridge.cycle();
    let replies = h.received();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].addr, "/trill/commandreply/updateBaseline");
    assert_eq!(replies[0].args, vec![s("b"), f(-1.0)]);
}

#[test]
fn bundles_are_dispatched_in_order() {
    let mut h = Harness::new("/trill");
    let bundle = OscPacket::Bundle(OscBundle {
        timetag: OscTime {
            seconds: 0,
            fractional: 1,
        },
        content: vec![
            OscPacket::Message(OscMessage {
                addr: "/trill/command/new".to_string(),
                args: vec![s("b"), f(1.0), s("bar")],
            }),
            OscPacket::Message(OscMessage {
                addr: "/trill/command/list".to_string(),
                args: vec![s("b")],
            }),
        ],
    });
    h.link.inject(rosc::encoder::encode(&bundle).unwrap());
    h.bridge.cycle();

    let addrs: Vec<String> = h.received().into_iter().map(|m| m.addr).collect();
    assert_eq!(
        addrs,
        vec!["/trill/commandreply/new", "/trill/commandreply/list"]
    );
}

#[test]
fn custom_root_namespace() {
    let mut h = Harness::new("/touch");
    h.send("/trill/command/createAll", vec![f(1.0)]);
    h.bridge.cycle();
    assert!(h.received().is_empty());

    h.send("/touch/command/createAll", vec![f(1.0)]);
    h.bridge.cycle();
    let replies = h.received();
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0].addr, "/touch/commandreply/new");
}

#[test]
fn mock_bus_from_config() {
    let config: Config = toml::from_str(
        r#"
[bus]
type = "mock"

[[bus.mock.devices]]
type = "craft"

[[bus.mock.devices]]
type = "ring"
bus = 2
"#,
    )
    .unwrap();
    assert_eq!(config.bus.bus_type, BusType::Mock);

    let mut controller = Controller::new(create_bus(&config.bus).unwrap(), true, Duration::ZERO);
    let replies = controller.create_all(1);
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].id(), "1-48-craft");
    assert_eq!(controller.create_all(2).len(), 1);
    assert_eq!(controller.registry().len(), 2);

    let default_bus = create_bus(&BusConfig {
        bus_type: BusType::Mock,
        ..Default::default()
    });
    assert!(default_bus.is_ok());
}
