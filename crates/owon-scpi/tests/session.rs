//! End-to-end session tests against a scripted transport.

use owon_scpi::{
    Channel, CodecContext, DeviceSession, ExchangeState, FrameAssembler, MockTransport,
    ParameterValue, ProbeAttenuation, ReplyStep, ScpiError, SessionConfig,
};

const HEAD: &str = r#"{
    "TIMEBASE": {"SCALE": "500us", "HOFFSET": -4},
    "SAMPLE": {"FULLSCREEN": 600, "DATALEN": 600, "SAMPLERATE": "(125MS/s)",
               "TYPE": "SAMPle", "DEPMEM": "4K"},
    "CHANNEL": [
        {"NAME": "CH1", "DISPLAY": "ON", "COUPLING": "DC", "PROBE": "10X",
         "SCALE": "200mV", "OFFSET": 50, "FREQUENCE": 1000.0},
        {"NAME": "CH2", "DISPLAY": "ON", "COUPLING": "AC", "PROBE": "1X",
         "SCALE": "50.0mV", "OFFSET": -82, "FREQUENCE": 0}
    ],
    "DATATYPE": "SCREEN",
    "RUNSTATUS": "STOP",
    "IDN": "OWON,HDS272S,2220112,V1.4.0",
    "TRIG": {"Mode": "SINGle", "Type": "EDGE",
             "Items": {"Channel": "CH1", "Level": "120mV", "Edge": "RISE"}}
}"#;

fn samples(n: usize) -> Vec<u8> {
    (0..n).map(|i| ((i % 200) as i32 - 100) as i8 as u8).collect()
}

#[test]
fn test_large_frame_over_small_chunks() {
    let payload: Vec<u8> = (0..20_000u32).map(|i| (i * 7 % 256) as u8).collect();
    let frame = FrameAssembler::encode(&payload);
    assert_eq!(&frame[..4], &[0x20, 0x4E, 0x00, 0x00]);

    for chunk in [1, 3, 64, 2048] {
        let mut mock = MockTransport::new().with_chunk_size(chunk);
        mock.expect(b":DATA:WAVE:SCREEN:CH1?\n", &frame);
        let mut session = DeviceSession::new(mock);

        let out = session
            .issue_binary_query(":DATA:WAVE:SCR:CH1?")
            .expect("should assemble frame");
        assert_eq!(out.len(), 20_000, "chunk size {}", chunk);
        assert_eq!(&out[..], &payload[..]);
        assert_eq!(session.state(), ExchangeState::Idle);
    }
}

#[test]
fn test_fetch_waveform_composes_header_and_data() {
    let mut mock = MockTransport::new().with_chunk_size(100);
    let mut raw = samples(600);
    raw[0] = 90;
    mock.expect_frame(":DATA:WAVE:SCREEN:HEAD?", HEAD.as_bytes());
    mock.expect_frame(":DATA:WAVE:SCREEN:CH1?", &raw);
    let mut session = DeviceSession::new(mock);

    let volts = session.fetch_waveform(Channel::Ch1).expect("should fetch waveform");
    assert_eq!(volts.len(), 600);
    assert_eq!(volts[0], 3.2);
    assert_eq!(
        session.transport().sent_lines(),
        vec![":DATA:WAVE:SCREEN:HEAD?", ":DATA:WAVE:SCREEN:CH1?"]
    );
}

#[test]
fn test_header_is_fetched_for_every_capture() {
    let mut mock = MockTransport::new();
    let changed = HEAD.replace("\"OFFSET\": 50", "\"OFFSET\": 0");
    mock.expect_frame(":DATA:WAVE:SCREEN:HEAD?", HEAD.as_bytes());
    mock.expect_frame(":DATA:WAVE:SCREEN:CH1?", &[90]);
    mock.expect_frame(":DATA:WAVE:SCREEN:HEAD?", changed.as_bytes());
    mock.expect_frame(":DATA:WAVE:SCREEN:CH1?", &[90]);
    let mut session = DeviceSession::new(mock);

    let first = session.fetch_waveform(Channel::Ch1).unwrap();
    let second = session.fetch_waveform(Channel::Ch1).unwrap();
    assert_eq!(first, vec![3.2]);
    assert_ne!(first, second);
}

#[test]
fn test_identical_queries_identical_values() {
    let mut mock = MockTransport::new().with_chunk_size(2);
    for _ in 0..2 {
        mock.expect_text(":HORIZONTAL:SCALE?", "500us\n");
        mock.expect_frame(":DATA:WAVE:SCREEN:HEAD?", HEAD.as_bytes());
        mock.expect_frame(":DATA:WAVE:SCREEN:CH2?", &samples(600));
    }
    let mut session = DeviceSession::new(mock);
    let ctx = CodecContext::default();

    let a = session.query_value(":HOR:SCAL?", &ctx).unwrap();
    let ha = session.fetch_header().unwrap();
    let wa = session.fetch_frame(Channel::Ch2).unwrap().voltages(&ha).unwrap();
    let b = session.query_value(":hor:scal?", &ctx).unwrap();
    let hb = session.fetch_header().unwrap();
    let wb = session.fetch_frame(Channel::Ch2).unwrap().voltages(&hb).unwrap();

    assert_eq!(a, ParameterValue::tag("500us"));
    assert_eq!(a, b);
    assert_eq!(ha, hb);
    assert_eq!(wa, wb);
}

#[test]
fn test_vertical_scale_against_probe() {
    let mut mock = MockTransport::new();
    mock.expect(b":CH1:SCALE 100mV\n", b"");
    let mut session = DeviceSession::new(mock);
    let value = ParameterValue::tag("100mV");

    let err = session
        .issue_command_with(
            ":CH1:SCALe",
            Some(&value),
            &CodecContext::with_probe(ProbeAttenuation::X1000),
        )
        .unwrap_err();
    assert!(matches!(err, ScpiError::InvalidDiscreteValue { .. }));
    assert!(session.transport().sent_data().is_empty());

    session
        .issue_command_with(
            ":CH1:SCALe",
            Some(&value),
            &CodecContext::with_probe(ProbeAttenuation::X10),
        )
        .expect("100mV is valid at 10X");
    assert_eq!(session.transport().sent_lines(), vec![":CH1:SCALE 100mV"]);
}

#[test]
fn test_truncated_frame_then_recover() {
    let mut mock = MockTransport::new().with_chunk_size(16);
    let frame = FrameAssembler::encode(&samples(600));
    mock.expect_steps(
        b":DATA:WAVE:SCREEN:CH2?\n",
        vec![ReplyStep::Data(frame[..300].to_vec()), ReplyStep::Silence],
    );
    mock.expect_text("*IDN?", "OWON,HDS272S,2220112,V1.4.0");
    let mut session = DeviceSession::new(mock);

    match session.fetch_frame(Channel::Ch2) {
        Err(ScpiError::TruncatedFrame { expected, received }) => {
            assert_eq!(expected, 600);
            assert_eq!(received, 296);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(session.state(), ExchangeState::Idle);

    // The device may still deliver the rest; drain before the next exchange.
    session.transport_mut().push_unsolicited(&frame[300..]);
    assert_eq!(session.drain().unwrap(), frame.len() - 300);
    assert_eq!(session.identify().unwrap().model, "HDS272S");
}

#[test]
fn test_no_retry_on_non_idempotent_action() {
    let mut mock = MockTransport::new();
    mock.expect(b":DMM:RANGE:STEP\n", b"");
    let mut session = DeviceSession::new(mock);
    session.issue_command(":DMM:RANG:STEP", None).unwrap();

    // A failing write is reported, never repeated.
    session.transport_mut().set_connected(false);
    let err = session.issue_command(":DMM:RANG:STEP", None).unwrap_err();
    assert!(matches!(err, ScpiError::Transport(_)));
    assert_eq!(session.transport().sent_data().len(), 1);
}

#[test]
fn test_oversize_declared_length_is_malformed() {
    let config = SessionConfig {
        max_payload_len: 4096,
        ..SessionConfig::default()
    };
    let mut mock = MockTransport::new();
    mock.expect(b":DATA:WAVE:SCREEN:CH1?\n", &[0x01, 0x10, 0x00, 0x00]);
    let mut session = DeviceSession::with_config(mock, config);
    assert!(matches!(
        session.fetch_frame(Channel::Ch1),
        Err(ScpiError::MalformedFrame(_))
    ));
}

#[test]
fn test_text_query_on_binary_command_rejected() {
    let mut session = DeviceSession::new(MockTransport::new());
    assert!(matches!(
        session.issue_query(":DATA:WAVE:SCREEN:HEAD?"),
        Err(ScpiError::ReplyKindMismatch { .. })
    ));
    assert!(matches!(
        session.issue_query(":AUTOSET?"),
        Err(ScpiError::NotQueryable(_))
    ));
    assert!(session.transport().sent_data().is_empty());
}
