//! Wire format of the PDUs the gateway publishes to the messaging stream.

/// Submission request as published on `submit.sm.<cid>`
#[derive(Clone, PartialEq, prost::Message)]
pub struct SubmitSm {
    /// Multipart chain in transmission order; never empty for a valid request
    #[prost(message, repeated, tag = "1")]
    pub segments: Vec<Segment>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Segment {
    #[prost(bytes = "vec", tag = "1")]
    pub short_message: Vec<u8>,
    #[prost(uint32, optional, tag = "2")]
    pub data_coding: Option<u32>,
    #[prost(string, optional, tag = "3")]
    pub data_coding_scheme: Option<String>,
    #[prost(string, tag = "4")]
    pub destination_addr: String,
    #[prost(string, optional, tag = "5")]
    pub source_addr: Option<String>,
}

/// Submission acknowledgement as published on `submit.sm.resp.<cid>`
#[derive(Clone, PartialEq, prost::Message)]
pub struct SubmitSmResp {
    #[prost(string, tag = "1")]
    pub command_status: String,
}
