use subgate_types::EpochMillis;

#[test]
fn now_is_positive() {
    assert!(EpochMillis::now().as_millis() > 0);
}

#[test]
fn ordering_follows_raw_millis() {
    let a = EpochMillis::from_millis(1_000);
    let b = EpochMillis::from_millis(2_000);
    assert!(a < b);
    assert_eq!(a.max(b), b);
}

#[test]
fn plus_days_adds_whole_days() {
    let base = EpochMillis::from_millis(0);
    assert_eq!(base.plus_days(1).as_millis(), 86_400_000);
    assert_eq!(base.plus_days(16).as_millis(), 16 * 86_400_000);
}

#[test]
fn plus_days_saturates() {
    let base = EpochMillis::from_millis(i64::MAX - 1);
    assert_eq!(base.plus_days(1).as_millis(), i64::MAX);
}

#[test]
fn serde_is_transparent() {
    let ts = EpochMillis::from_millis(1_700_000_000_000);
    let json = serde_json::to_string(&ts).unwrap();
    assert_eq!(json, "1700000000000");
    let parsed: EpochMillis = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, ts);
}
