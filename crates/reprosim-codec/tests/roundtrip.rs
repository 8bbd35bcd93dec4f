//! Codec fidelity tests: typed arrays and record tables survive a trip
//! through JSON text with exact dtype, shape and values.

use reprosim_codec::{
    decode_tree, CodecError, DType, Dataset, Record, Scalar, Tagged, TypedArray,
};
use serde::{Deserialize, Serialize};

fn record(pairs: &[(&str, Scalar)]) -> Record {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[test]
fn float_matrix_is_bit_identical_after_text_roundtrip() {
    let values = [0.1, -0.0, 1e-310, f64::MAX, std::f64::consts::PI, 2.0 / 3.0];
    let arr = TypedArray::from_f64(vec![2, 3], &values).expect("build array");

    let text = serde_json::to_string(&arr).expect("serialize");
    let back: TypedArray = serde_json::from_str(&text).expect("deserialize");

    assert_eq!(back.dtype(), DType::Float64);
    assert_eq!(back.shape(), &[2, 3]);
    let decoded = back.to_f64_vec().expect("float64 reader");
    for (a, b) in values.iter().zip(&decoded) {
        assert_eq!(a.to_bits(), b.to_bits());
    }
    assert_eq!(back.as_bytes(), arr.as_bytes());
}

#[test]
fn nan_payload_survives_as_bytes() {
    // NaN cannot be written as a JSON number but rides inside the base64 buffer.
    let arr = TypedArray::from_f64(vec![1], &[f64::NAN]).expect("build array");
    let back: TypedArray =
        serde_json::from_str(&serde_json::to_string(&arr).unwrap()).expect("deserialize");
    assert!(back.to_f64_vec().unwrap()[0].is_nan());
}

#[test]
fn float32_stays_float32() {
    let arr = TypedArray::from_f32(vec![3], &[0.1, 0.2, 0.3]).expect("build array");
    let back: TypedArray =
        serde_json::from_str(&serde_json::to_string(&arr).unwrap()).expect("deserialize");
    assert_eq!(back.dtype(), DType::Float32);
    assert_eq!(back.to_f32_vec().unwrap(), vec![0.1f32, 0.2, 0.3]);
}

#[test]
fn table_preserves_record_order_and_cells() {
    let ds = Dataset::new(vec![
        record(&[
            ("quality", Scalar::Float(0.5)),
            ("alpha", Scalar::Int(0)),
            ("label", Scalar::Str("x".into())),
        ]),
        record(&[
            ("quality", Scalar::Float(0.75)),
            ("alpha", Scalar::Int(1)),
            ("label", Scalar::Str("y".into())),
        ]),
        record(&[
            ("quality", Scalar::Null),
            ("alpha", Scalar::Float(2.0)),
            ("label", Scalar::Bool(false)),
        ]),
    ]);

    let text = serde_json::to_string_pretty(&ds).expect("serialize");
    let back: Dataset = serde_json::from_str(&text).expect("deserialize");

    assert_eq!(back.len(), 3);
    for (original, decoded) in ds.records().iter().zip(back.records()) {
        assert_eq!(original, decoded);
    }
    assert_eq!(back.records()[2]["alpha"], Scalar::Float(2.0));
}

#[test]
fn codec_values_embed_in_derived_structs() {
    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Envelope {
        name: String,
        state: Option<TypedArray>,
        results: Option<Dataset>,
    }

    let env = Envelope {
        name: "sweep".to_string(),
        state: Some(TypedArray::from_u64(vec![2], &[7, 9]).unwrap()),
        results: Some(Dataset::new(vec![record(&[("a", Scalar::Int(1))])])),
    };
    let text = serde_json::to_string(&env).unwrap();
    assert!(text.contains("__ndarray__"));
    assert!(text.contains("__dataframe__"));
    let back: Envelope = serde_json::from_str(&text).unwrap();
    assert_eq!(back, env);
}

#[test]
fn unknown_dtype_fails_only_that_value() {
    let doc = serde_json::json!({
        "good": TypedArray::from_i64(vec![1], &[5]).unwrap().encode(),
        "bad": {"__ndarray__": "AAAAAAAAAAA=", "dtype": "float128", "shape": [1]},
    });
    let obj = doc.as_object().unwrap();

    let good = Tagged::classify(obj["good"].clone()).expect("good value decodes");
    assert_eq!(good.as_array().unwrap().to_i64_vec().unwrap(), vec![5]);

    match Tagged::classify(obj["bad"].clone()) {
        Err(CodecError::UnknownElementType(name)) => assert_eq!(name, "float128"),
        other => panic!("expected UnknownElementType, got {other:?}"),
    }

    assert!(decode_tree(doc).is_err());
}
