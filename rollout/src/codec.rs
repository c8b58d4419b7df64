//! MessagePack encoding of a feature record.
//!
//! A record is written as `[percentage, [team_id, ...]]`. The name is not part of the
//! payload, it lives in the redis key.
//!
//! Reading is lenient about shape: either field may be missing (`[50]`, `[[1, 2]]`, `[]`),
//! the override array may be `nil`, and the legacy stream layout, where the percentage and
//! the override array follow each other without an enclosing array, is accepted too.
//! Writing always uses the enclosing array, so readers that only understand the stream
//! layout can't decode records written here.

use std::collections::HashSet;

use rmpv::Value;

use crate::errors::CodecError;
use crate::feature::Feature;

/// The persisted part of a feature.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureRecord {
    pub percentage: u8,
    pub team_ids: HashSet<i64>,
}

pub fn encode(feature: &Feature) -> Result<Vec<u8>, CodecError> {
    let team_ids = feature
        .sorted_team_ids()
        .into_iter()
        .map(Value::from)
        .collect();
    let value = Value::Array(vec![
        Value::from(feature.percentage()),
        Value::Array(team_ids),
    ]);

    let mut buf = Vec::new();
    rmpv::encode::write_value(&mut buf, &value).map_err(|e| CodecError::Encode(e.to_string()))?;
    Ok(buf)
}

pub fn decode(data: &[u8]) -> Result<FeatureRecord, CodecError> {
    let mut rd = data;
    let first = read_value(&mut rd)?;

    let fields = match first {
        Value::Array(fields) => {
            if !rd.is_empty() {
                return Err(CodecError::Decode(format!(
                    "{} trailing bytes after record",
                    rd.len()
                )));
            }
            fields
        }
        percentage => {
            let mut fields = vec![percentage];
            while !rd.is_empty() {
                fields.push(read_value(&mut rd)?);
            }
            fields
        }
    };

    decode_fields(fields)
}

/// Decode a payload straight into the feature it belongs to.
pub fn decode_into(data: &[u8], feature: &mut Feature) -> Result<(), CodecError> {
    let record = decode(data)?;
    feature.hydrate(record.percentage, record.team_ids);
    Ok(())
}

fn read_value(rd: &mut &[u8]) -> Result<Value, CodecError> {
    rmpv::decode::read_value(rd).map_err(|e| CodecError::Decode(e.to_string()))
}

fn decode_fields(fields: Vec<Value>) -> Result<FeatureRecord, CodecError> {
    if fields.len() > 2 {
        return Err(CodecError::Decode(format!(
            "expected at most 2 fields, got {}",
            fields.len()
        )));
    }

    let mut record = FeatureRecord::default();
    let last = fields.len().saturating_sub(1);

    for (index, field) in fields.into_iter().enumerate() {
        match field {
            Value::Integer(_) if index == 0 => record.percentage = decode_percentage(&field)?,
            Value::Array(ids) if index == last => record.team_ids = decode_team_ids(ids)?,
            Value::Nil if index == last => {}
            other => {
                return Err(CodecError::Decode(format!(
                    "unexpected value at field {index}: {other}"
                )))
            }
        }
    }

    Ok(record)
}

fn decode_percentage(value: &Value) -> Result<u8, CodecError> {
    let percentage = value
        .as_u64()
        .and_then(|p| u8::try_from(p).ok())
        .ok_or_else(|| CodecError::Decode(format!("percentage is not a uint8: {value}")))?;

    if percentage > 100 {
        return Err(CodecError::Decode(format!(
            "percentage out of range: {percentage}"
        )));
    }

    Ok(percentage)
}

fn decode_team_ids(ids: Vec<Value>) -> Result<HashSet<i64>, CodecError> {
    ids.iter()
        .map(|id| {
            id.as_i64()
                .ok_or_else(|| CodecError::Decode(format!("team id is not an int64: {id}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn feature(percentage: u8, team_ids: &[i64]) -> Feature {
        let mut f = Feature::new("example");
        f.activate_percentage(percentage);
        for id in team_ids {
            f.activate_team(*id);
        }
        f
    }

    fn ids(team_ids: &[i64]) -> HashSet<i64> {
        team_ids.iter().copied().collect()
    }

    #[rstest]
    #[case::percentage_and_teams(50, &[1, 2, 3])]
    #[case::just_percentage(50, &[])]
    #[case::just_teams(0, &[1, 2, 3])]
    #[case::empty(0, &[])]
    #[case::extreme_ids(100, &[i64::MIN, -1, 0, i64::MAX])]
    fn test_encode_decode(#[case] percentage: u8, #[case] team_ids: &[i64]) {
        let input = feature(percentage, team_ids);

        let data = encode(&input).unwrap();
        let mut output = Feature::new("example");
        decode_into(&data, &mut output).unwrap();

        assert_eq!(output, input);
    }

    #[test]
    fn test_encoding_layout() {
        // fixarray(2), positive fixint 50, fixarray(3) with 1, 2, 3
        let data = encode(&feature(50, &[3, 1, 2])).unwrap();
        assert_eq!(data, vec![0x92, 0x32, 0x93, 0x01, 0x02, 0x03]);

        let data = encode(&Feature::new("example")).unwrap();
        assert_eq!(data, vec![0x92, 0x00, 0x90]);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let a = feature(10, &[9, 8, 7, 6, 5, 4, 3, 2, 1]);
        let b = feature(10, &[1, 2, 3, 4, 5, 6, 7, 8, 9]);
        assert_eq!(encode(&a).unwrap(), encode(&b).unwrap());
    }

    #[rstest]
    #[case::only_percentage(vec![0x91, 0x19], 25, &[])]
    #[case::only_teams(vec![0x91, 0x92, 0x01, 0x02], 0, &[1, 2])]
    #[case::empty_array(vec![0x90], 0, &[])]
    #[case::nil_teams(vec![0x92, 0x19, 0xc0], 25, &[])]
    #[case::uint8_marker(vec![0x92, 0xcc, 0x64, 0x90], 100, &[])]
    #[case::negative_team(vec![0x92, 0x00, 0x91, 0xff], 0, &[-1])]
    #[case::legacy_stream(vec![0x32, 0x92, 0x01, 0x02], 50, &[1, 2])]
    #[case::legacy_stream_nil(vec![0x32, 0xc0], 50, &[])]
    #[case::legacy_percentage_only(vec![0x05], 5, &[])]
    fn test_decode_partial_records(
        #[case] data: Vec<u8>,
        #[case] percentage: u8,
        #[case] team_ids: &[i64],
    ) {
        let record = decode(&data).unwrap();
        assert_eq!(record.percentage, percentage);
        assert_eq!(record.team_ids, ids(team_ids));
    }

    #[test]
    fn test_decode_duplicate_team_ids_collapse() {
        let record = decode(&[0x92, 0x00, 0x93, 0x07, 0x07, 0x08]).unwrap();
        assert_eq!(record.team_ids, ids(&[7, 8]));
    }

    #[rstest]
    #[case::empty_input(vec![])]
    #[case::truncated(vec![0x92, 0x32])]
    #[case::too_many_fields(vec![0x93, 0x00, 0x90, 0x90])]
    #[case::percentage_over_100(vec![0x92, 0x65, 0x90])]
    #[case::percentage_over_255(vec![0x92, 0xcd, 0x01, 0x00, 0x90])]
    #[case::negative_percentage(vec![0x92, 0xff, 0x90])]
    #[case::string_percentage(vec![0x92, 0xa1, 0x61, 0x90])]
    #[case::string_team_id(vec![0x92, 0x00, 0x91, 0xa1, 0x61])]
    #[case::team_id_over_i64(vec![0x92, 0x00, 0x91, 0xcf, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff])]
    #[case::teams_before_percentage(vec![0x92, 0x90, 0x32])]
    #[case::trailing_bytes(vec![0x92, 0x32, 0x90, 0x01])]
    #[case::map(vec![0x81, 0x01, 0x02])]
    fn test_decode_rejects_malformed(#[case] data: Vec<u8>) {
        match decode(&data) {
            Err(CodecError::Decode(_)) => (),
            other => panic!("Expected Decode error for {data:02x?}, got {other:?}"),
        }
    }

    #[test]
    fn test_failed_decode_leaves_feature_untouched() {
        let mut f = feature(40, &[1]);
        let before = f.clone();

        assert!(decode_into(&[0x92, 0x65, 0x90], &mut f).is_err());
        assert_eq!(f, before);
    }
}
