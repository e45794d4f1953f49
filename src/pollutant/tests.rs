use super::*;

fn raw(pairs: &[(&str, f64)]) -> RawReading {
    pairs.iter().map(|(k, v)| (*k, *v)).collect()
}

#[test]
fn test_pm25_spellings_collapse_to_one_key() {
    for key in ["pm2.5", "pm25", "pm2_5", "PM2.5", " Pm2_5 ", "pm-2.5", "PM 2.5"] {
        assert_eq!(canonical_key(key), Some(Pollutant::Pm25), "key {:?}", key);
    }
}

#[test]
fn test_long_form_synonyms() {
    assert_eq!(canonical_key("carbon_monoxide"), Some(Pollutant::Co));
    assert_eq!(canonical_key("nitrogen_dioxide"), Some(Pollutant::No2));
    assert_eq!(canonical_key("sulphur_dioxide"), Some(Pollutant::So2));
    assert_eq!(canonical_key("sulfur_dioxide"), Some(Pollutant::So2));
    assert_eq!(canonical_key("methane"), Some(Pollutant::Ch4));
    assert_eq!(canonical_key("ozone"), Some(Pollutant::O3));
}

#[test]
fn test_unrecognized_keys_dropped() {
    let reading = normalize(&raw(&[
        ("pm10", 40.0),
        ("temp", 21.5),
        ("humidity", 60.0),
        ("pm1", 3.0),
    ]));

    assert_eq!(reading.len(), 1);
    assert_eq!(reading[&Pollutant::Pm10], 40.0);
}

#[test]
fn test_last_write_wins_in_payload_order() {
    let reading = normalize(&raw(&[("pm2.5", 10.0), ("pm25", 20.0), ("PM2_5", 30.0)]));
    assert_eq!(reading[&Pollutant::Pm25], 30.0);

    let reading = normalize(&raw(&[("PM2_5", 30.0), ("pm2.5", 10.0)]));
    assert_eq!(reading[&Pollutant::Pm25], 10.0);
}

#[test]
fn test_non_finite_values_dropped() {
    let reading = normalize(&raw(&[
        ("pm2_5", f64::NAN),
        ("pm10", f64::INFINITY),
        ("co", 500.0),
    ]));

    assert!(!reading.contains_key(&Pollutant::Pm25));
    assert!(!reading.contains_key(&Pollutant::Pm10));
    assert_eq!(reading[&Pollutant::Co], 500.0);
}

#[test]
fn test_negative_values_kept() {
    let reading = normalize(&raw(&[("no2", -3.0)]));
    assert_eq!(reading[&Pollutant::No2], -3.0);
}

#[test]
fn test_conversion_divides_co_and_ch4_only() {
    let reading = normalize(&raw(&[
        ("co", 2000.0),
        ("ch4", 1500.0),
        ("pm2_5", 400.0),
        ("pm10", 120.0),
        ("no2", 45.0),
        ("so2", 12.0),
    ]));
    let converted = to_breakpoint_units(&reading);

    assert_eq!(converted.get(Pollutant::Co), Some(2.0));
    assert_eq!(converted.get(Pollutant::Ch4), Some(1.5));
    assert_eq!(converted.get(Pollutant::Pm25), Some(400.0));
    assert_eq!(converted.get(Pollutant::Pm10), Some(120.0));
    assert_eq!(converted.get(Pollutant::No2), Some(45.0));
    assert_eq!(converted.get(Pollutant::So2), Some(12.0));
}

#[test]
fn test_ch4_reported_but_not_indexable() {
    let reading = normalize(&raw(&[("methane", 1800.0), ("pm10", 50.0)]));
    let converted = to_breakpoint_units(&reading);

    assert!(converted.all().contains_key(&Pollutant::Ch4));
    let indexable: Vec<Pollutant> = converted.indexable().map(|(p, _)| p).collect();
    assert_eq!(indexable, vec![Pollutant::Pm10]);
}

#[test]
fn test_canonical_order() {
    let mut sorted = Pollutant::ALL.to_vec();
    sorted.sort();
    assert_eq!(sorted, Pollutant::ALL.to_vec());
    assert_eq!(Pollutant::ALL[0], Pollutant::Pm25);
}

#[test]
fn test_id_roundtrip_and_display() {
    for p in Pollutant::ALL {
        assert_eq!(Pollutant::from_id(p.id()), Some(p));
    }
    assert_eq!(Pollutant::from_id("PM2.5"), None);
    assert_eq!(Pollutant::Pm25.to_string(), "PM2.5");
    assert_eq!(
        serde_json::to_string(&Pollutant::Pm25).unwrap(),
        "\"pm2_5\""
    );
}
