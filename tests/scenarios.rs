use pretty_assertions::assert_eq;

use ofp4str::openflow0x04::multipart::MAX_MULTIPART_BODY;
use ofp4str::openflow0x04::{
    Action, Bucket, FlowMod, FlowModCmd, FlowModFlags, FlowRule, FlowStats, FlowStatsEntry,
    GroupDesc, GroupDescriptor, GroupModCmd, GroupType, Instruction, NoVendor, OfpGroup, OfpPort,
};
use ofp4str::{
    decode_flow_mod, decode_flows_multipart_message, decode_group_mod,
    decode_groups_desc_multipart_message, encode_flow_mod, encode_flows_multipart,
    encode_group_mod, encode_groups_desc_multipart, Codecs, DecodeError, EncodeError,
};

const COMMANDS: [FlowModCmd; 5] = [
    FlowModCmd::AddFlow,
    FlowModCmd::ModFlow,
    FlowModCmd::ModStrictFlow,
    FlowModCmd::DeleteFlow,
    FlowModCmd::DeleteStrictFlow,
];

#[test]
fn delete_strict_uses_wildcard_defaults() {
    let codecs = Codecs::basic();
    let rule = FlowRule::parse(
        "table=3,priority=100,eth_type=0x0800",
        FlowModCmd::DeleteStrictFlow,
        &codecs,
    )
    .unwrap();
    let bytes = encode_flow_mod(&rule, FlowModCmd::DeleteStrictFlow, 1).unwrap();
    // cookie mask
    assert_eq!(&bytes[16..24], &[0; 8]);
    assert_eq!(bytes[24], 3);
    assert_eq!(bytes[25], FlowModCmd::DeleteStrictFlow as u8);
    assert_eq!(&bytes[30..32], &100u16.to_be_bytes());
    // buffer id, out port, out group
    assert_eq!(&bytes[32..36], &[0; 4]);
    assert_eq!(&bytes[36..40], &(OfpPort::Any as u32).to_be_bytes());
    assert_eq!(&bytes[40..44], &(OfpGroup::Any as u32).to_be_bytes());

    let decoded = decode_flow_mod(&bytes, &NoVendor).unwrap();
    assert_eq!(decoded.rule.out_port, OfpPort::Any as u32);
    assert_eq!(decoded.rule.cookie_mask, 0);
    assert_eq!(
        decoded.to_text(&codecs).unwrap(),
        "command=delete_strict,table=3,priority=100,eth_type=0x0800"
    );
}

/// An 80 byte entry: 48 fixed, a 16 byte match and two 8 byte instructions.
fn small_entry(i: u32) -> FlowStatsEntry {
    let codecs = Codecs::basic();
    let mut entry = FlowStatsEntry::parse("eth_type=0x0800,@meter=1,@goto=2", &codecs).unwrap();
    entry.rule.instructions[0] = Instruction::Meter(i);
    entry.packet_count = i as u64;
    entry
}

#[test]
fn large_dump_is_fragmented_minimally() {
    let entries: Vec<FlowStatsEntry> = (0..5000).map(small_entry).collect();
    assert_eq!(entries[0].size_of(), 80);
    let msgs = encode_flows_multipart(&FlowStats::Reply(entries.clone()), 77).unwrap();

    let per_message = MAX_MULTIPART_BODY / 80;
    assert_eq!(msgs.len(), entries.len().div_ceil(per_message));
    assert_eq!(msgs.len(), 7);

    let mut decoded = vec![];
    for (i, msg) in msgs.iter().enumerate() {
        assert!(msg.len() <= 0xffff);
        assert_eq!(u16::from_be_bytes([msg[2], msg[3]]) as usize, msg.len());
        let env = decode_flows_multipart_message(msg, &NoVendor).unwrap();
        assert_eq!(env.xid, 77);
        assert_eq!(env.more, i + 1 < msgs.len());
        match env.body {
            FlowStats::Reply(mut part) => decoded.append(&mut part),
            FlowStats::Request(_) => panic!("reply decoded as request"),
        }
    }
    assert_eq!(decoded, entries);
}

#[test]
fn oversized_entry_fails() {
    let mut actions = vec![];
    for port in 0..4091 {
        actions.push(Action::output(port));
    }
    let entry = FlowStatsEntry::new(FlowRule {
        instructions: vec![Instruction::ApplyActions(actions), Instruction::Meter(1)],
        ..FlowRule::defaults(FlowModCmd::AddFlow)
    });
    assert_eq!(entry.size_of(), 65528);
    assert_eq!(
        encode_flows_multipart(&FlowStats::Reply(vec![small_entry(0), entry]), 1),
        Err(EncodeError::EntryTooLarge { length: 65528 })
    );
}

#[test]
fn empty_group_dump_is_one_message() {
    let msgs = encode_groups_desc_multipart(&GroupDesc::Reply(vec![]), 3).unwrap();
    assert_eq!(msgs.len(), 1);
    assert_eq!(msgs[0].len(), 16);
    let env = decode_groups_desc_multipart_message(&msgs[0], &NoVendor).unwrap();
    assert!(!env.more);
    assert_eq!(env.body, GroupDesc::Reply(vec![]));
}

#[test]
fn group_dump_keeps_entries_whole() {
    let groups: Vec<GroupDescriptor> = (0..3000)
        .map(|id| GroupDescriptor {
            group_id: id,
            group_type: GroupType::Indirect,
            buckets: vec![Bucket::new(vec![Action::output(id), Action::PopVlan])],
        })
        .collect();
    let msgs = encode_groups_desc_multipart(&GroupDesc::Reply(groups.clone()), 3).unwrap();
    assert!(msgs.len() > 1);
    let mut decoded = vec![];
    for msg in &msgs {
        match decode_groups_desc_multipart_message(msg, &NoVendor).unwrap().body {
            GroupDesc::Reply(mut part) => decoded.append(&mut part),
            GroupDesc::Request => panic!("reply decoded as request"),
        }
    }
    assert_eq!(decoded, groups);
}

#[test]
fn select_group_weights_survive() {
    let codecs = Codecs::basic();
    let group = GroupDescriptor::parse(
        12,
        GroupType::Select,
        &["weight=10,output=1", "weight=20,output=2", "weight=30,output=3"],
        &codecs,
    )
    .unwrap();
    let bytes = encode_group_mod(&group, GroupModCmd::Add, 5).unwrap();
    let decoded = decode_group_mod(&bytes, &NoVendor).unwrap();
    assert_eq!(decoded.group.group_type, GroupType::Select);
    let weights: Vec<u16> = decoded.group.buckets.iter().map(|b| b.weight).collect();
    assert_eq!(weights, vec![10, 20, 30]);
    for bucket in &decoded.group.buckets {
        assert_eq!(bucket.watch_port, OfpPort::Any as u32);
        assert_eq!(bucket.watch_group, OfpGroup::Any as u32);
    }
    assert_eq!(
        decoded.to_text(&codecs).unwrap(),
        "command=add\ngroup_id=12,type=select\n  weight=10,output=1\n  weight=20,output=2\n  weight=30,output=3"
    );
}

#[test]
fn unsupported_match_type_is_reported() {
    let codecs = Codecs::basic();
    let rule = FlowRule::parse("in_port=1,@apply,output=2", FlowModCmd::AddFlow, &codecs).unwrap();
    let mut bytes = encode_flow_mod(&rule, FlowModCmd::AddFlow, 0).unwrap();
    // OFPMT_STANDARD
    bytes[48..50].copy_from_slice(&0u16.to_be_bytes());
    assert_eq!(
        decode_flow_mod(&bytes, &NoVendor),
        Err(DecodeError::UnsupportedMatchType {
            offset: 48,
            found: 0,
        })
    );
}

#[test]
fn text_round_trips_for_every_command() {
    let codecs = Codecs::basic();
    let texts = [
        "priority=1",
        "cookie=0x1,table=4,in_port=controller,@apply,output=controller:0x80",
        "cookie=0x10/0xf0,out_port=3,out_group=any,idle_timeout=5,hard_timeout=10,check_overlap,\
         ipv4_dst=10.0.0.0/255.0.0.0,@metadata=0x1/0xff,@write,set_queue=2,group=3,@goto=9",
        "buffer=0x10,eth_src=00:11:22:33:44:55,@clear",
    ];
    for command in COMMANDS {
        for text in texts {
            let rule = FlowRule::parse(text, command, &codecs).unwrap();
            let bytes = encode_flow_mod(&rule, command, 0).unwrap();
            assert_eq!(bytes.len() % 8, 0);
            let decoded = decode_flow_mod(&bytes, &NoVendor).unwrap();
            assert_eq!(decoded.command, command);
            assert_eq!(decoded.rule, rule);
            let rendered = decoded.to_text(&codecs).unwrap();
            let reparsed = FlowMod::parse_text(&rendered, FlowModCmd::AddFlow, 0, &codecs).unwrap();
            assert_eq!(reparsed.command, command);
            assert_eq!(
                encode_flow_mod(&reparsed.rule, reparsed.command, 0).unwrap(),
                bytes,
                "{rendered}"
            );
        }
    }
}

#[test]
fn dump_text_keeps_counters_and_unknown_parts() {
    let codecs = Codecs::basic();
    let mut entry = small_entry(9);
    entry.duration_sec = 60;
    entry.byte_count = 9000;
    entry.rule.flags = FlowModFlags::from_bits_retain(0x8002);
    entry.rule.instructions.push(Instruction::ApplyActions(vec![Action::Unknown {
        typ: 0x63,
        data: vec![0xde, 0xad, 0xbe, 0xef],
    }]));
    entry.rule.instructions.push(Instruction::Unknown {
        typ: 0x7f,
        data: vec![0; 4],
    });
    let msgs = encode_flows_multipart(&FlowStats::Reply(vec![entry.clone()]), 2).unwrap();
    let env = decode_flows_multipart_message(&msgs[0], &NoVendor).unwrap();
    let text = env.body.to_text(&codecs).unwrap();
    assert_eq!(
        text,
        "duration_sec=60,packet_count=9,byte_count=9000,check_overlap,flags=0x8000,\
         eth_type=0x0800,@meter=9,@goto=2,@apply,unknown_action=0x63:deadbeef,@unknown=0x7f:00000000"
    );
    assert_eq!(FlowStatsEntry::parse(&text, &codecs).unwrap(), entry);
}

#[test]
fn decoding_noise_never_panics() {
    bolero::check!().for_each(|bytes: &[u8]| {
        let _ = decode_flow_mod(bytes, &NoVendor);
        let _ = decode_group_mod(bytes, &NoVendor);
    });
}
