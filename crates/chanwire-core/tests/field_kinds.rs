//! Every storage / wire pairing through a channel, and hostile truncation.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;

use bytes::Bytes;

use chanwire_core::protocol::WireType;
use chanwire_core::{ChannelContext, FieldList, Message, Result, Schema, Side};

#[derive(Debug, Clone, Default, PartialEq)]
struct Kinds {
    flag: bool,
    small: u8,
    tiny: i8,
    short: u16,
    narrowed: i16,
    wide: u32,
    signed: i32,
    big: u64,
    most_negative: i64,
    counter: u32,
    single: f32,
    promoted: f32,
    double: f64,
    label: String,
    blob: Vec<u8>,
    shared: Bytes,
}

struct AllKinds {
    channel: Arc<ChannelContext>,
    k: Kinds,
}

impl Message for AllKinds {
    fn channel(&self) -> &Arc<ChannelContext> {
        &self.channel
    }

    fn side() -> Side {
        Side::Server
    }

    fn instantiate(channel: Arc<ChannelContext>) -> Result<Self> {
        Ok(Self {
            channel,
            k: Kinds::default(),
        })
    }
}

impl Schema for AllKinds {
    fn declare(f: &mut FieldList<Self>) {
        f.field("flag", |m: &Self| &m.k.flag, |m| &mut m.k.flag);
        f.field("small", |m: &Self| &m.k.small, |m| &mut m.k.small);
        f.field("tiny", |m: &Self| &m.k.tiny, |m| &mut m.k.tiny);
        f.field("short", |m: &Self| &m.k.short, |m| &mut m.k.short);
        f.field("narrowed", |m: &Self| &m.k.narrowed, |m| &mut m.k.narrowed)
            .marshalled_as("i8");
        f.field("wide", |m: &Self| &m.k.wide, |m| &mut m.k.wide);
        f.field("signed", |m: &Self| &m.k.signed, |m| &mut m.k.signed);
        f.field("big", |m: &Self| &m.k.big, |m| &mut m.k.big);
        f.field("mostNegative", |m: &Self| &m.k.most_negative, |m| &mut m.k.most_negative);
        f.field("counter", |m: &Self| &m.k.counter, |m| &mut m.k.counter)
            .marshalled_as("varint");
        f.field("single", |m: &Self| &m.k.single, |m| &mut m.k.single);
        f.field("promoted", |m: &Self| &m.k.promoted, |m| &mut m.k.promoted)
            .marshalled_as("f64");
        f.field("double", |m: &Self| &m.k.double, |m| &mut m.k.double);
        f.field("label", |m: &Self| &m.k.label, |m| &mut m.k.label);
        f.field("blob", |m: &Self| &m.k.blob, |m| &mut m.k.blob);
        f.field("shared", |m: &Self| &m.k.shared, |m| &mut m.k.shared);
    }
}

fn channel() -> Arc<ChannelContext> {
    let ctx = ChannelContext::for_channel("kinds").unwrap();
    ctx.register::<AllKinds>().unwrap();
    ctx
}

fn extremes(ctx: &Arc<ChannelContext>) -> AllKinds {
    AllKinds {
        channel: Arc::clone(ctx),
        k: Kinds {
            flag: true,
            small: u8::MAX,
            tiny: i8::MIN,
            short: u16::MAX,
            narrowed: -5,
            wide: u32::MAX,
            signed: i32::MIN,
            big: u64::MAX,
            most_negative: i64::MIN,
            counter: u32::MAX,
            single: 0.1,
            promoted: 1.5,
            double: -2.25e300,
            label: "ünïcode".into(),
            blob: vec![0, 1, 2, 0xFF],
            shared: Bytes::from_static(b"shared"),
        },
    }
}

#[test]
fn default_and_overridden_wire_types() {
    let ctx = channel();
    let desc = ctx.descriptor::<AllKinds>().unwrap();
    let wire: Vec<_> = desc.fields.iter().map(|f| (f.name, f.wire)).collect();
    assert_eq!(
        wire,
        vec![
            ("flag", WireType::Bool),
            ("small", WireType::U8),
            ("tiny", WireType::I8),
            ("short", WireType::U16),
            ("narrowed", WireType::I8),
            ("wide", WireType::U32),
            ("signed", WireType::I32),
            ("big", WireType::U64),
            ("mostNegative", WireType::I64),
            ("counter", WireType::VarInt),
            ("single", WireType::F32),
            ("promoted", WireType::F64),
            ("double", WireType::F64),
            ("label", WireType::Str),
            ("blob", WireType::Bytes),
            ("shared", WireType::Bytes),
        ]
    );
    assert_eq!(desc.bool_count, 1);
}

#[test]
fn every_pairing_round_trips_at_its_extremes() {
    let ctx = channel();
    let sent = extremes(&ctx);
    let bytes = ctx.encode(&sent).unwrap();

    let back = ctx
        .decode(Side::Server, bytes)
        .unwrap()
        .downcast::<AllKinds>()
        .unwrap();
    assert_eq!(back.k, sent.k);
}

#[test]
fn varint_of_u32_max_takes_five_bytes() {
    let ctx = channel();
    let mut m = AllKinds::instantiate(Arc::clone(&ctx)).unwrap();
    let short = ctx.encode(&m).unwrap().len();
    m.k.counter = u32::MAX;
    let long = ctx.encode(&m).unwrap().len();
    assert_eq!(long - short, 4);
}

#[test]
fn every_truncated_prefix_is_rejected() {
    let ctx = channel();
    let bytes = ctx.encode(&extremes(&ctx)).unwrap();

    for cut in 0..bytes.len() {
        let res = ctx.decode(Side::Server, bytes.slice(..cut));
        assert!(res.is_err(), "prefix of {cut} bytes decoded");
    }
    assert!(ctx.decode(Side::Server, bytes).is_ok());
}
