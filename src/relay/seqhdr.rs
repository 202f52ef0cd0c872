use bytes::Bytes;

use crate::av::{Packet, PacketKind};

/// Publisher-side sideband: configuration and metadata packets are folded
/// into slots here, and subsequent media packets carry the current bytes
/// by shared reference. Video keyframes get the video sequence header;
/// every audio frame gets the audio sequence header; both carry metadata.
#[derive(Default)]
pub struct SeqhdrMerge {
    v_seq_hdr: Option<Bytes>,
    a_seq_hdr: Option<Bytes>,
    metadata: Option<Bytes>,
}

impl SeqhdrMerge {
    pub fn new() -> Self {
        SeqhdrMerge::default()
    }

    /// Fold or decorate one packet. Config/metadata packets are absorbed
    /// (`None`); media packets come back decorated.
    pub fn merge(&mut self, mut pkt: Packet) -> Option<Packet> {
        match pkt.kind {
            PacketKind::H264DecoderConfig => {
                self.v_seq_hdr = Some(pkt.data.clone());
                None
            }
            PacketKind::AacDecoderConfig => {
                self.a_seq_hdr = Some(pkt.data.clone());
                None
            }
            PacketKind::Metadata => {
                self.metadata = Some(pkt.data.clone());
                None
            }
            PacketKind::H264 => {
                pkt.metadata = self.metadata.clone();
                if pkt.is_keyframe {
                    pkt.v_seq_hdr = self.v_seq_hdr.clone();
                }
                Some(pkt)
            }
            PacketKind::Aac => {
                pkt.metadata = self.metadata.clone();
                pkt.a_seq_hdr = self.a_seq_hdr.clone();
                Some(pkt)
            }
            PacketKind::H264SpsPpsNalu => Some(pkt),
        }
    }
}

/// Subscriber-side inverse: before a media packet goes out, any sideband
/// bytes that differ from the last ones sent become synthetic metadata /
/// sequence-header packets emitted first. A late joiner therefore always
/// receives the configuration its first frames depend on.
#[derive(Default)]
pub struct SeqhdrSplit {
    v_seq_hdr: Option<Bytes>,
    a_seq_hdr: Option<Bytes>,
    metadata: Option<Bytes>,
}

impl SeqhdrSplit {
    pub fn new() -> Self {
        SeqhdrSplit::default()
    }

    fn meta_packet(&mut self, pkt: &Packet, out: &mut Vec<Packet>) {
        if let Some(data) = &pkt.metadata {
            if pkt.metadata != self.metadata {
                let mut meta = Packet::new(PacketKind::Metadata, data.clone());
                meta.time = pkt.time;
                out.push(meta);
                self.metadata = pkt.metadata.clone();
            }
        }
    }

    /// Expand one packet into the run to forward, config first
    pub fn split(&mut self, pkt: &Packet) -> Vec<Packet> {
        let mut out = Vec::with_capacity(3);
        match pkt.kind {
            PacketKind::H264 => {
                self.meta_packet(pkt, &mut out);
                if pkt.is_keyframe {
                    if let Some(data) = &pkt.v_seq_hdr {
                        if pkt.v_seq_hdr != self.v_seq_hdr {
                            let mut cfg =
                                Packet::new(PacketKind::H264DecoderConfig, data.clone());
                            cfg.time = pkt.time;
                            out.push(cfg);
                            self.v_seq_hdr = pkt.v_seq_hdr.clone();
                        }
                    }
                }
                out.push(pkt.clone());
            }
            PacketKind::Aac => {
                self.meta_packet(pkt, &mut out);
                if let Some(data) = &pkt.a_seq_hdr {
                    if pkt.a_seq_hdr != self.a_seq_hdr {
                        let mut cfg = Packet::new(PacketKind::AacDecoderConfig, data.clone());
                        cfg.time = pkt.time;
                        out.push(cfg);
                        self.a_seq_hdr = pkt.a_seq_hdr.clone();
                    }
                }
                out.push(pkt.clone());
            }
            _ => out.push(pkt.clone()),
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyframe(tag: u8) -> Packet {
        let mut p = Packet::new(PacketKind::H264, Bytes::from(vec![tag]));
        p.is_keyframe = true;
        p
    }

    fn audio(tag: u8) -> Packet {
        Packet::new(PacketKind::Aac, Bytes::from(vec![tag]))
    }

    #[test]
    fn test_merge_folds_and_decorates() {
        let mut merge = SeqhdrMerge::new();

        let meta = Packet::new(PacketKind::Metadata, Bytes::from_static(b"meta"));
        let vcfg = Packet::new(PacketKind::H264DecoderConfig, Bytes::from_static(b"vcfg"));
        let acfg = Packet::new(PacketKind::AacDecoderConfig, Bytes::from_static(b"acfg"));
        assert!(merge.merge(meta).is_none());
        assert!(merge.merge(vcfg).is_none());
        assert!(merge.merge(acfg).is_none());

        let key = merge.merge(keyframe(1)).unwrap();
        assert_eq!(key.v_seq_hdr.as_deref(), Some(b"vcfg".as_ref()));
        assert_eq!(key.metadata.as_deref(), Some(b"meta".as_ref()));
        assert!(key.a_seq_hdr.is_none());

        let mut inter = Packet::new(PacketKind::H264, Bytes::from(vec![2]));
        inter.is_keyframe = false;
        let inter = merge.merge(inter).unwrap();
        // inter frames carry no video sequence header
        assert!(inter.v_seq_hdr.is_none());

        let aud = merge.merge(audio(3)).unwrap();
        assert_eq!(aud.a_seq_hdr.as_deref(), Some(b"acfg".as_ref()));
        assert_eq!(aud.metadata.as_deref(), Some(b"meta".as_ref()));
    }

    #[test]
    fn test_split_injects_in_order() {
        let mut split = SeqhdrSplit::new();

        let mut key = keyframe(1);
        key.v_seq_hdr = Some(Bytes::from_static(b"vcfg"));
        key.metadata = Some(Bytes::from_static(b"meta"));

        let out = split.split(&key);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].kind, PacketKind::Metadata);
        assert_eq!(out[1].kind, PacketKind::H264DecoderConfig);
        assert_eq!(out[2].kind, PacketKind::H264);

        // unchanged sideband: no re-injection
        let out = split.split(&key);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, PacketKind::H264);
    }

    #[test]
    fn test_split_reinjects_on_config_change() {
        let mut split = SeqhdrSplit::new();

        let mut key = keyframe(1);
        key.v_seq_hdr = Some(Bytes::from_static(b"v1"));
        assert_eq!(split.split(&key).len(), 2);

        let mut key2 = keyframe(2);
        key2.v_seq_hdr = Some(Bytes::from_static(b"v2"));
        let out = split.split(&key2);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].kind, PacketKind::H264DecoderConfig);
        assert_eq!(out[0].data.as_ref(), b"v2");
    }

    #[test]
    fn test_merge_then_split_round_trip() {
        let mut merge = SeqhdrMerge::new();
        let mut split = SeqhdrSplit::new();

        merge.merge(Packet::new(
            PacketKind::AacDecoderConfig,
            Bytes::from_static(b"acfg"),
        ));

        let decorated = merge.merge(audio(7)).unwrap();
        let out = split.split(&decorated);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].kind, PacketKind::AacDecoderConfig);
        assert_eq!(out[0].data.as_ref(), b"acfg");
        assert_eq!(out[1].kind, PacketKind::Aac);
    }
}
