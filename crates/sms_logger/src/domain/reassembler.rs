use common::domain::SegmentChain;

/// Bytes reserved for the multipart header at the start of the first segment
pub const MULTIPART_HEADER_LEN: usize = 6;

/// Reassembled message body and the number of segments it spanned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reassembled {
    pub buffer: Vec<u8>,
    pub segment_count: usize,
}

/// Concatenate a segment chain into one message body.
///
/// The header is stripped from the first segment only; later segments are
/// appended whole. A first segment shorter than the header yields no bytes.
pub fn reassemble(chain: &SegmentChain) -> Reassembled {
    let mut buffer = chain
        .first()
        .payload
        .get(MULTIPART_HEADER_LEN..)
        .map(<[u8]>::to_vec)
        .unwrap_or_default();
    let mut segment_count = 1;

    for segment in chain.iter().skip(1) {
        segment_count += 1;
        buffer.extend_from_slice(&segment.payload);
    }

    Reassembled {
        buffer,
        segment_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::domain::MessageSegment;

    fn segment(payload: &[u8]) -> MessageSegment {
        MessageSegment {
            payload: payload.to_vec(),
            data_coding: None,
            destination_addr: "+15550001".to_string(),
            source_addr: None,
        }
    }

    #[test]
    fn test_single_segment_strips_header() {
        let chain = SegmentChain::single(segment(b"\x05\x00\x03\x2a\x01\x01Hello"));

        let result = reassemble(&chain);

        assert_eq!(result.segment_count, 1);
        assert_eq!(result.buffer, b"Hello");
    }

    #[test]
    fn test_two_segments_only_first_header_stripped() {
        let chain = SegmentChain::new(vec![
            segment(b"HEADERtext"),
            segment(b"moretext"),
        ])
        .unwrap();

        let result = reassemble(&chain);

        assert_eq!(result.segment_count, 2);
        assert_eq!(result.buffer.len(), 12);
        assert_eq!(result.buffer, b"textmoretext");
    }

    #[test]
    fn test_chain_length_and_total_size() {
        let payloads: Vec<Vec<u8>> = vec![vec![1u8; 20], vec![2u8; 15], vec![3u8; 7], vec![4u8; 1]];
        let chain =
            SegmentChain::new(payloads.iter().map(|p| segment(p)).collect()).unwrap();

        let result = reassemble(&chain);

        let expected_len = (payloads[0].len() - MULTIPART_HEADER_LEN)
            + payloads[1..].iter().map(Vec::len).sum::<usize>();
        assert_eq!(result.segment_count, payloads.len());
        assert_eq!(result.buffer.len(), expected_len);
        assert_eq!(result.buffer[..14], [1u8; 14]);
        assert_eq!(result.buffer[14..29], [2u8; 15]);
    }

    #[test]
    fn test_first_segment_shorter_than_header() {
        let chain = SegmentChain::new(vec![segment(b"abc"), segment(b"tail")]).unwrap();

        let result = reassemble(&chain);

        assert_eq!(result.segment_count, 2);
        assert_eq!(result.buffer, b"tail");
    }
}
