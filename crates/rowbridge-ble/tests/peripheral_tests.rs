//! Integration Tests for the GATT Peripheral Layer
//!
//! Registers the standard profile table on the in-memory radio and plays the
//! client side: reads, subscriptions, unsubscription and vanishing clients.
//! Timing-sensitive tests run on tokio's paused clock.

use std::time::Duration;

use rowbridge_ble::{MemoryRadio, PeripheralAdapter, Radio, RegistrationError, Sensors};
use rowbridge_core::profiles::{
    bluetooth_uuid, cycling_power_measurement, BODY_SENSOR_LOCATION_UUID,
    CYCLING_POWER_FEATURE_UUID, CYCLING_POWER_MEASUREMENT_UUID, CYCLING_POWER_SERVICE_UUID,
    HEART_RATE_MEASUREMENT_UUID, HEART_RATE_SERVICE_UUID, RSC_SERVICE_UUID, SENSOR_LOCATION_UUID,
};
use rowbridge_core::{
    standard_profiles, BridgeConfig, CharacteristicSpec, ConfigurationError, HostError,
    SensorProfile, Status,
};
use tokio::time::{timeout, Instant};

// ----------------------------------------------------------------------------
// Test Utilities
// ----------------------------------------------------------------------------

const CP_TEMPLATE: [u8; 8] = [0x20, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];

async fn registered(radio: &MemoryRadio) -> (Box<dyn PeripheralAdapter>, Sensors) {
    let config = BridgeConfig::default();
    let mut adapter = radio.acquire(&config.device_name).await.unwrap();
    let sensors = Sensors::register(adapter.as_mut(), &standard_profiles(), &config)
        .await
        .unwrap();
    (adapter, sensors)
}

fn broken_profile() -> SensorProfile {
    SensorProfile::new(
        "Broken",
        bluetooth_uuid(0x1816),
        vec![
            CharacteristicSpec::notify(CYCLING_POWER_MEASUREMENT_UUID, CP_TEMPLATE.to_vec()),
            CharacteristicSpec::new(SENSOR_LOCATION_UUID, "Indicate", vec![0x00]),
        ],
        cycling_power_measurement,
    )
}

// ----------------------------------------------------------------------------
// Registration Tests
// ----------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_registration_order_and_advertisement() {
    let radio = MemoryRadio::new();
    let (mut adapter, sensors) = registered(&radio).await;

    let expected = vec![
        CYCLING_POWER_SERVICE_UUID,
        RSC_SERVICE_UUID,
        HEART_RATE_SERVICE_UUID,
    ];
    assert_eq!(radio.services(), expected);
    assert_eq!(sensors.identifiers(), expected);

    tokio_test::assert_ok!(adapter.advertise("rowbridge", &sensors.identifiers()).await);
    let advertisement = radio.advertisement().unwrap();
    assert_eq!(advertisement.device_name, "rowbridge");
    assert_eq!(advertisement.services, expected);
}

#[tokio::test(start_paused = true)]
async fn test_each_service_settles_before_the_next() {
    let radio = MemoryRadio::new();
    let start = Instant::now();

    registered(&radio).await;

    assert_eq!(start.elapsed(), Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_unknown_kind_registers_nothing() {
    let radio = MemoryRadio::new();
    let config = BridgeConfig::default();
    let mut adapter = radio.acquire(&config.device_name).await.unwrap();

    let mut profiles = standard_profiles();
    profiles.push(broken_profile());

    let err = Sensors::register(adapter.as_mut(), &profiles, &config)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RegistrationError::Configuration(ConfigurationError::UnknownFunction { ref function, .. })
            if function == "Indicate"
    ));
    assert!(!err.is_recoverable());
    assert!(radio.services().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_host_rejection_is_recoverable() {
    let radio = MemoryRadio::new();
    radio.fail_registrations(1);
    let config = BridgeConfig::default();
    let mut adapter = radio.acquire(&config.device_name).await.unwrap();

    let err = Sensors::register(adapter.as_mut(), &standard_profiles(), &config)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RegistrationError::Host(HostError::RegistrationFailed { service, .. })
            if service == CYCLING_POWER_SERVICE_UUID
    ));
    assert!(err.is_recoverable());
}

// ----------------------------------------------------------------------------
// Read Tests
// ----------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_reads_return_static_payloads() {
    let radio = MemoryRadio::new();
    let (_adapter, sensors) = registered(&radio).await;

    // telemetry never reaches read characteristics
    sensors.distribute(Status::with_power(400));

    assert_eq!(
        radio.read(CYCLING_POWER_SERVICE_UUID, CYCLING_POWER_FEATURE_UUID),
        Some(vec![0x08, 0x00, 0x00, 0x00])
    );
    assert_eq!(
        radio.read(CYCLING_POWER_SERVICE_UUID, SENSOR_LOCATION_UUID),
        Some(vec![0x00])
    );
    assert_eq!(
        radio.read(HEART_RATE_SERVICE_UUID, BODY_SENSOR_LOCATION_UUID),
        Some(vec![0x01])
    );
    assert_eq!(
        radio.read(CYCLING_POWER_SERVICE_UUID, CYCLING_POWER_MEASUREMENT_UUID),
        None
    );
}

// ----------------------------------------------------------------------------
// Notify Tests
// ----------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_power_reaches_subscriber() {
    let radio = MemoryRadio::new();
    let (_adapter, sensors) = registered(&radio).await;

    let mut subscription = radio
        .subscribe(CYCLING_POWER_SERVICE_UUID, CYCLING_POWER_MEASUREMENT_UUID)
        .unwrap();
    sensors.distribute(Status::with_power(150));

    let payload = subscription.next().await.unwrap();
    assert_eq!(&payload[2..4], &[0x96, 0x00]);
    assert_eq!(&payload[..2], &CP_TEMPLATE[..2]);
    assert_eq!(&payload[4..], &CP_TEMPLATE[4..]);
}

#[tokio::test(start_paused = true)]
async fn test_idle_subscriber_gets_keepalives() {
    let radio = MemoryRadio::new();
    let (_adapter, _sensors) = registered(&radio).await;

    let start = Instant::now();
    let mut subscription = radio
        .subscribe(HEART_RATE_SERVICE_UUID, HEART_RATE_MEASUREMENT_UUID)
        .unwrap();

    assert_eq!(subscription.next().await.unwrap(), vec![0x00, 0x00]);
    assert_eq!(start.elapsed(), Duration::from_secs(4));
    assert_eq!(subscription.next().await.unwrap(), vec![0x00, 0x00]);
    assert_eq!(start.elapsed(), Duration::from_secs(8));
}

#[tokio::test(start_paused = true)]
async fn test_unsubscribe_ends_the_loop() {
    let radio = MemoryRadio::new();
    let (_adapter, sensors) = registered(&radio).await;
    let sensor = sensors.get(CYCLING_POWER_SERVICE_UUID).unwrap();

    let mut subscription = radio
        .subscribe(CYCLING_POWER_SERVICE_UUID, CYCLING_POWER_MEASUREMENT_UUID)
        .unwrap();
    subscription.next().await.unwrap();
    assert_eq!(sensor.active_subscriptions(), 1);

    subscription.cancel();
    timeout(Duration::from_secs(4), subscription.finished())
        .await
        .expect("notify loop should stop within one timeout");
    assert_eq!(sensor.active_subscriptions(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_vanished_client_must_resubscribe() {
    let radio = MemoryRadio::new();
    let (_adapter, sensors) = registered(&radio).await;
    let sensor = sensors.get(CYCLING_POWER_SERVICE_UUID).unwrap();

    let subscription = radio
        .subscribe(CYCLING_POWER_SERVICE_UUID, CYCLING_POWER_MEASUREMENT_UUID)
        .unwrap();
    subscription.disconnect();
    sensors.distribute(Status::with_power(90));
    subscription.finished().await;
    assert_eq!(sensor.active_subscriptions(), 0);

    let mut again = radio
        .subscribe(CYCLING_POWER_SERVICE_UUID, CYCLING_POWER_MEASUREMENT_UUID)
        .unwrap();
    sensors.distribute(Status::with_power(91));
    let payload = again.next().await.unwrap();
    assert_eq!(&payload[2..4], &91u16.to_le_bytes());
}

#[tokio::test(start_paused = true)]
async fn test_release_cancels_subscriptions() {
    let radio = MemoryRadio::new();
    let (mut adapter, _sensors) = registered(&radio).await;

    let subscription = radio
        .subscribe(RSC_SERVICE_UUID, rowbridge_core::profiles::RSC_MEASUREMENT_UUID)
        .unwrap();

    adapter.release().await.unwrap();
    timeout(Duration::from_secs(4), subscription.finished())
        .await
        .expect("release should stop every notify loop");
    assert!(radio.services().is_empty());
    assert_eq!(radio.releases(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_statuses_are_dropped_while_nobody_listens() {
    let radio = MemoryRadio::new();
    let (_adapter, sensors) = registered(&radio).await;

    for power in 1..=10u16 {
        sensors.distribute(Status::with_power(power));
    }

    let stats = sensors.distributor_stats();
    assert_eq!(stats.len(), 3);
    for stat in &stats {
        assert_eq!(stat.delivered(), 1);
        assert_eq!(stat.dropped(), 9);
    }

    // the pending status is the first one offered
    let mut subscription = radio
        .subscribe(CYCLING_POWER_SERVICE_UUID, CYCLING_POWER_MEASUREMENT_UUID)
        .unwrap();
    let payload = subscription.next().await.unwrap();
    assert_eq!(&payload[2..4], &[0x01, 0x00]);
}
