//! Embedded metadata: sampler loops, cue points, instrument and ACID info,
//! broadcast extension, `LIST` INFO text and `LIST` adtl labels.
//!
//! All records of a stream live in one [`Metadata`] arena. Records refer to
//! their variable-length payloads through [`Span`]s into the arena's pools,
//! so a record is only meaningful together with the arena it came from.
//! Reading sizes the arena exactly in a counting pass before filling it; see
//! [`parse`].

pub mod parse;
pub mod write;

use std::borrow::Cow;

use crate::wav::chunks::ChunkID;

pub use parse::{MetadataPlan, MetadataPlanner};

/// Range into one of the arena pools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Span {
    pub start: u32,
    pub len: u32,
}

impl Span {
    pub const EMPTY: Span = Span { start: 0, len: 0 };

    #[inline]
    pub const fn range(self) -> core::ops::Range<usize> {
        self.start as usize..self.start as usize + self.len as usize
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.len == 0
    }
}

/// One loop of a `smpl` chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SampleLoop {
    pub cue_point_id: u32,
    /// 0 forward, 1 alternating, 2 backward
    pub loop_type: u32,
    /// First sample frame of the loop
    pub first: u32,
    /// Last sample frame of the loop
    pub last: u32,
    pub fraction: u32,
    /// 0 means loop forever
    pub play_count: u32,
}

/// Fixed fields of a `smpl` chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SamplerInfo {
    pub manufacturer: u32,
    pub product: u32,
    /// Nanoseconds per sample
    pub sample_period: u32,
    pub midi_unity_note: u32,
    pub midi_pitch_fraction: u32,
    pub smpte_format: u32,
    pub smpte_offset: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Smpl {
    pub info: SamplerInfo,
    /// Indices into [`Metadata::loops`]
    pub loops: Span,
    /// Vendor-specific trailing bytes
    pub sampler_data: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CuePoint {
    pub id: u32,
    pub play_order_position: u32,
    /// Normally `data`
    pub data_chunk_id: [u8; 4],
    pub chunk_start: u32,
    pub block_start: u32,
    pub sample_byte_offset: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cue {
    /// Indices into [`Metadata::cue_points`]
    pub points: Span,
}

/// `inst` chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Inst {
    pub midi_unity_note: i8,
    pub fine_tune_cents: i8,
    pub gain_decibels: i8,
    pub low_note: i8,
    pub high_note: i8,
    pub low_velocity: i8,
    pub high_velocity: i8,
}

/// `acid` chunk
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Acid {
    pub flags: u32,
    pub midi_unity_note: u16,
    pub reserved1: u16,
    pub reserved2: f32,
    pub num_beats: u32,
    pub meter_denominator: u16,
    pub meter_numerator: u16,
    pub tempo: f32,
}

/// Fixed, non-text fields of a `bext` chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BextInfo {
    /// `yyyy-mm-dd`
    pub origination_date: [u8; 10],
    /// `hh-mm-ss`
    pub origination_time: [u8; 8],
    /// Samples since midnight
    pub time_reference: u64,
    pub version: u16,
    pub umid: [u8; 64],
    pub loudness_value: i16,
    pub loudness_range: i16,
    pub max_true_peak_level: i16,
    pub max_momentary_loudness: i16,
    pub max_short_term_loudness: i16,
}

impl Default for BextInfo {
    fn default() -> Self {
        BextInfo {
            origination_date: [0; 10],
            origination_time: [0; 8],
            time_reference: 0,
            version: 0,
            umid: [0; 64],
            loudness_value: 0,
            loudness_range: 0,
            max_true_peak_level: 0,
            max_momentary_loudness: 0,
            max_short_term_loudness: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bext {
    pub info: BextInfo,
    pub description: Span,
    pub originator_name: Span,
    pub originator_reference: Span,
    pub coding_history: Span,
}

/// `labl` or `note` entry of an adtl list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CueText {
    pub cue_point_id: u32,
    pub text: Span,
}

/// Fixed fields of an `ltxt` entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegionInfo {
    pub cue_point_id: u32,
    pub sample_length: u32,
    pub purpose_id: [u8; 4],
    pub country: u16,
    pub language: u16,
    pub dialect: u16,
    pub code_page: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelledCueRegion {
    pub info: RegionInfo,
    pub text: Span,
}

/// INFO list keys the codec understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InfoTag {
    /// ISFT
    Software,
    /// ICOP
    Copyright,
    /// INAM
    Title,
    /// IART
    Artist,
    /// ICMT
    Comment,
    /// ICRD
    Date,
    /// IGNR
    Genre,
    /// IPRD
    Album,
    /// ITRK
    TrackNumber,
}

impl InfoTag {
    pub const ALL: [InfoTag; 9] = [
        InfoTag::Software,
        InfoTag::Copyright,
        InfoTag::Title,
        InfoTag::Artist,
        InfoTag::Comment,
        InfoTag::Date,
        InfoTag::Genre,
        InfoTag::Album,
        InfoTag::TrackNumber,
    ];

    pub const fn chunk_id(self) -> ChunkID {
        ChunkID::new(match self {
            InfoTag::Software => b"ISFT",
            InfoTag::Copyright => b"ICOP",
            InfoTag::Title => b"INAM",
            InfoTag::Artist => b"IART",
            InfoTag::Comment => b"ICMT",
            InfoTag::Date => b"ICRD",
            InfoTag::Genre => b"IGNR",
            InfoTag::Album => b"IPRD",
            InfoTag::TrackNumber => b"ITRK",
        })
    }

    pub fn from_chunk_id(id: ChunkID) -> Option<Self> {
        InfoTag::ALL.into_iter().find(|tag| tag.chunk_id() == id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InfoText {
    pub tag: InfoTag,
    pub text: Span,
}

/// Where a chunk sits: at the top level or inside a `LIST`.
/// Unknown chunks keep it so they can be written back in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkLocation {
    TopLevel,
    InfoList,
    AdtlList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownChunk {
    pub id: ChunkID,
    pub location: ChunkLocation,
    pub data: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetadataRecord {
    Smpl(Smpl),
    Cue(Cue),
    Inst(Inst),
    Acid(Acid),
    Bext(Bext),
    Label(CueText),
    Note(CueText),
    LabelledCueRegion(LabelledCueRegion),
    InfoText(InfoText),
    Unknown(UnknownChunk),
}

impl MetadataRecord {
    /// Short name of the record kind
    pub const fn kind(&self) -> &'static str {
        match self {
            MetadataRecord::Smpl(_) => "smpl",
            MetadataRecord::Cue(_) => "cue",
            MetadataRecord::Inst(_) => "inst",
            MetadataRecord::Acid(_) => "acid",
            MetadataRecord::Bext(_) => "bext",
            MetadataRecord::Label(_) => "labl",
            MetadataRecord::Note(_) => "note",
            MetadataRecord::LabelledCueRegion(_) => "ltxt",
            MetadataRecord::InfoText(_) => "info",
            MetadataRecord::Unknown(_) => "unknown",
        }
    }
}

/// Arena holding every metadata record of a stream and their payloads
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Metadata {
    pub(crate) records: Vec<MetadataRecord>,
    pub(crate) loops: Vec<SampleLoop>,
    pub(crate) cue_points: Vec<CuePoint>,
    pub(crate) bytes: Vec<u8>,
}

impl Metadata {
    pub fn builder() -> MetadataBuilder {
        MetadataBuilder::default()
    }

    /// Empty arena with exactly the capacity a counting pass asked for
    pub fn with_plan(plan: &MetadataPlan) -> Self {
        Metadata {
            records: Vec::with_capacity(plan.records),
            loops: Vec::with_capacity(plan.loops),
            cue_points: Vec::with_capacity(plan.cue_points),
            bytes: Vec::with_capacity(plan.bytes),
        }
    }

    pub fn records(&self) -> &[MetadataRecord] {
        &self.records
    }

    pub fn iter(&self) -> core::slice::Iter<'_, MetadataRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn loops(&self, smpl: &Smpl) -> &[SampleLoop] {
        self.loops.get(smpl.loops.range()).unwrap_or(&[])
    }

    pub fn cue_points(&self, cue: &Cue) -> &[CuePoint] {
        self.cue_points.get(cue.points.range()).unwrap_or(&[])
    }

    pub fn bytes(&self, span: Span) -> &[u8] {
        self.bytes.get(span.range()).unwrap_or(&[])
    }

    /// Text payload, lossily decoded
    pub fn text(&self, span: Span) -> Cow<'_, str> {
        String::from_utf8_lossy(self.bytes(span))
    }

    /// First INFO entry for `tag`
    pub fn info(&self, tag: InfoTag) -> Option<Cow<'_, str>> {
        self.records.iter().find_map(|record| match record {
            MetadataRecord::InfoText(info) if info.tag == tag => Some(self.text(info.text)),
            _ => None,
        })
    }

    /// Records of the given kind (see [`MetadataRecord::kind`])
    pub fn count_kind(&self, kind: &str) -> usize {
        self.records.iter().filter(|r| r.kind() == kind).count()
    }

    /// Total arena footprint in bytes, records included
    pub fn arena_size(&self) -> usize {
        self.records.len() * size_of::<MetadataRecord>()
            + self.loops.len() * size_of::<SampleLoop>()
            + self.cue_points.len() * size_of::<CuePoint>()
            + self.bytes.len()
    }

    pub(crate) fn push_bytes(&mut self, data: &[u8]) -> Span {
        let start = self.bytes.len() as u32;
        self.bytes.extend_from_slice(data);
        Span {
            start,
            len: data.len() as u32,
        }
    }
}

impl<'a> IntoIterator for &'a Metadata {
    type Item = &'a MetadataRecord;
    type IntoIter = core::slice::Iter<'a, MetadataRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Composes a [`Metadata`] arena for writing
#[derive(Debug, Default)]
pub struct MetadataBuilder {
    metadata: Metadata,
}

impl MetadataBuilder {
    pub fn sampler(mut self, info: SamplerInfo, loops: &[SampleLoop], sampler_data: &[u8]) -> Self {
        let start = self.metadata.loops.len() as u32;
        self.metadata.loops.extend_from_slice(loops);
        let sampler_data = self.metadata.push_bytes(sampler_data);
        self.metadata.records.push(MetadataRecord::Smpl(Smpl {
            info,
            loops: Span {
                start,
                len: loops.len() as u32,
            },
            sampler_data,
        }));
        self
    }

    pub fn cue_points(mut self, points: &[CuePoint]) -> Self {
        let start = self.metadata.cue_points.len() as u32;
        self.metadata.cue_points.extend_from_slice(points);
        self.metadata.records.push(MetadataRecord::Cue(Cue {
            points: Span {
                start,
                len: points.len() as u32,
            },
        }));
        self
    }

    pub fn instrument(mut self, inst: Inst) -> Self {
        self.metadata.records.push(MetadataRecord::Inst(inst));
        self
    }

    pub fn acid(mut self, acid: Acid) -> Self {
        self.metadata.records.push(MetadataRecord::Acid(acid));
        self
    }

    pub fn bext(
        mut self,
        info: BextInfo,
        description: &str,
        originator_name: &str,
        originator_reference: &str,
        coding_history: &str,
    ) -> Self {
        let bext = Bext {
            info,
            description: self.metadata.push_bytes(description.as_bytes()),
            originator_name: self.metadata.push_bytes(originator_name.as_bytes()),
            originator_reference: self.metadata.push_bytes(originator_reference.as_bytes()),
            coding_history: self.metadata.push_bytes(coding_history.as_bytes()),
        };
        self.metadata.records.push(MetadataRecord::Bext(bext));
        self
    }

    pub fn label(mut self, cue_point_id: u32, text: &str) -> Self {
        let text = self.metadata.push_bytes(text.as_bytes());
        self.metadata
            .records
            .push(MetadataRecord::Label(CueText { cue_point_id, text }));
        self
    }

    pub fn note(mut self, cue_point_id: u32, text: &str) -> Self {
        let text = self.metadata.push_bytes(text.as_bytes());
        self.metadata
            .records
            .push(MetadataRecord::Note(CueText { cue_point_id, text }));
        self
    }

    pub fn labelled_region(mut self, info: RegionInfo, text: &str) -> Self {
        let text = self.metadata.push_bytes(text.as_bytes());
        self.metadata
            .records
            .push(MetadataRecord::LabelledCueRegion(LabelledCueRegion { info, text }));
        self
    }

    pub fn info_text(mut self, tag: InfoTag, text: &str) -> Self {
        let text = self.metadata.push_bytes(text.as_bytes());
        self.metadata
            .records
            .push(MetadataRecord::InfoText(InfoText { tag, text }));
        self
    }

    pub fn unknown(mut self, id: ChunkID, location: ChunkLocation, data: &[u8]) -> Self {
        let data = self.metadata.push_bytes(data);
        self.metadata
            .records
            .push(MetadataRecord::Unknown(UnknownChunk { id, location, data }));
        self
    }

    pub fn build(self) -> Metadata {
        self.metadata
    }
}
