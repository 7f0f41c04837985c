//! Two-pass metadata reading.
//!
//! [`walk_chunks`] visits every metadata chunk, descending into `LIST`
//! chunks. It runs twice over the same chunk list: first with a
//! [`MetadataPlanner`], which only reads fixed headers and adds up record,
//! loop, cue-point and byte counts, then with a [`MetadataFiller`] writing
//! into a [`Metadata`] arena allocated from that plan. The fill pass never
//! grows the arena; exceeding the plan is reported as corrupt data.

use std::io::{Read, Seek, SeekFrom};

use crate::{
    error::{AudioIOError, AudioIOResult},
    types::ContainerKind,
    wav::{
        chunks::{
            ACID_CHUNK, ADTL_LIST, BEXT_CHUNK, CUE_CHUNK, ChunkDesc, ChunkID, DATA_CHUNK,
            DS64_CHUNK, FACT_CHUNK, FLLR_CHUNK, FMT_CHUNK, INFO_LIST, INST_CHUNK, JUNK_CHUNK,
            LABL_CHUNK, LIST_CHUNK, LIST_CHUNK_LOWER, LTXT_CHUNK, NOTE_CHUNK, PAD_CHUNK,
            SMPL_CHUNK, read_chunk_header,
        },
        endian::{f32_at, i16_at, read_array, u16_at, u32_at, u64_at},
    },
};

use super::{
    Acid, Bext, BextInfo, ChunkLocation, Cue, CuePoint, CueText, InfoTag, InfoText, Inst,
    LabelledCueRegion, Metadata, MetadataRecord, RegionInfo, SampleLoop, SamplerInfo, Smpl, Span,
    UnknownChunk,
};

pub(crate) const SMPL_HEADER_SIZE: u64 = 36;
pub(crate) const SAMPLE_LOOP_SIZE: u64 = 24;
pub(crate) const CUE_POINT_SIZE: u64 = 24;
pub(crate) const INST_SIZE: u64 = 7;
pub(crate) const ACID_SIZE: u64 = 24;
pub(crate) const BEXT_FIXED_SIZE: u64 = 602;
pub(crate) const BEXT_DESCRIPTION_SIZE: usize = 256;
pub(crate) const BEXT_ORIGINATOR_SIZE: usize = 32;
pub(crate) const BEXT_ORIGINATOR_REF_SIZE: usize = 32;
pub(crate) const LTXT_FIXED_SIZE: u64 = 20;
pub(crate) const CUE_TEXT_FIXED_SIZE: u64 = 4;

/// Chunk types that never produce a metadata record
const STRUCTURAL_CHUNKS: [ChunkID; 7] = [
    FMT_CHUNK, DATA_CHUNK, FACT_CHUNK, DS64_CHUNK, JUNK_CHUNK, PAD_CHUNK, FLLR_CHUNK,
];

/// True if a top-level chunk should be handed to the metadata walker
pub(crate) fn is_metadata_chunk(id: ChunkID) -> bool {
    !STRUCTURAL_CHUNKS.contains(&id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkKind {
    Smpl,
    Cue,
    Inst,
    Acid,
    Bext,
    Label,
    Note,
    Ltxt,
    Info(InfoTag),
    Unknown,
    Ignored,
}

fn classify(id: ChunkID, location: ChunkLocation) -> ChunkKind {
    match location {
        ChunkLocation::TopLevel => match id {
            SMPL_CHUNK => ChunkKind::Smpl,
            CUE_CHUNK => ChunkKind::Cue,
            INST_CHUNK => ChunkKind::Inst,
            ACID_CHUNK => ChunkKind::Acid,
            BEXT_CHUNK => ChunkKind::Bext,
            _ if is_metadata_chunk(id) => ChunkKind::Unknown,
            _ => ChunkKind::Ignored,
        },
        ChunkLocation::InfoList => match InfoTag::from_chunk_id(id) {
            Some(tag) => ChunkKind::Info(tag),
            None => ChunkKind::Unknown,
        },
        ChunkLocation::AdtlList => match id {
            LABL_CHUNK => ChunkKind::Label,
            NOTE_CHUNK => ChunkKind::Note,
            LTXT_CHUNK => ChunkKind::Ltxt,
            _ => ChunkKind::Unknown,
        },
    }
}

/// Smallest body each kind needs; shorter chunks are skipped in both passes
const fn min_body_size(kind: ChunkKind) -> u64 {
    match kind {
        ChunkKind::Smpl => SMPL_HEADER_SIZE,
        ChunkKind::Cue => 4,
        ChunkKind::Inst => INST_SIZE,
        ChunkKind::Acid => ACID_SIZE,
        ChunkKind::Bext => BEXT_FIXED_SIZE,
        ChunkKind::Label | ChunkKind::Note => CUE_TEXT_FIXED_SIZE,
        ChunkKind::Ltxt => LTXT_FIXED_SIZE,
        ChunkKind::Info(_) | ChunkKind::Unknown | ChunkKind::Ignored => 0,
    }
}

/// Loops and sampler-data bytes that actually fit in a `smpl` body
fn smpl_layout(size: u64, loop_count: u32, sampler_size: u32) -> (u64, u64) {
    let available = size - SMPL_HEADER_SIZE;
    let loops = (loop_count as u64).min(available / SAMPLE_LOOP_SIZE);
    let sampler = (sampler_size as u64).min(available - loops * SAMPLE_LOOP_SIZE);
    (loops, sampler)
}

/// Cue points that actually fit in a `cue ` body
fn cue_layout(size: u64, count: u32) -> u64 {
    (count as u64).min((size - 4) / CUE_POINT_SIZE)
}

/// Per-chunk callback of [`walk_chunks`]. The reader is positioned at the
/// start of the body and the visitor may consume up to `size` bytes.
pub(crate) trait ChunkVisitor {
    fn visit<R: Read + ?Sized>(
        &mut self,
        reader: &mut R,
        id: ChunkID,
        size: u64,
        location: ChunkLocation,
    ) -> AudioIOResult<()>;
}

/// Visit every chunk in `chunks`, descending into INFO and adtl lists
pub(crate) fn walk_chunks<R, V>(
    reader: &mut R,
    chunks: &[ChunkDesc],
    visitor: &mut V,
) -> AudioIOResult<()>
where
    R: Read + Seek + ?Sized,
    V: ChunkVisitor,
{
    for chunk in chunks {
        reader.seek(SeekFrom::Start(chunk.body_offset))?;
        if chunk.id == LIST_CHUNK || chunk.id == LIST_CHUNK_LOWER {
            walk_list(reader, chunk, visitor)?;
        } else {
            visitor.visit(reader, chunk.id, chunk.logical_size, ChunkLocation::TopLevel)?;
        }
    }
    Ok(())
}

fn walk_list<R, V>(reader: &mut R, chunk: &ChunkDesc, visitor: &mut V) -> AudioIOResult<()>
where
    R: Read + Seek + ?Sized,
    V: ChunkVisitor,
{
    let location = if chunk.logical_size >= 4 {
        match ChunkID::new(&read_array::<_, 4>(reader)?) {
            INFO_LIST => Some(ChunkLocation::InfoList),
            ADTL_LIST => Some(ChunkLocation::AdtlList),
            _ => None,
        }
    } else {
        None
    };

    let Some(location) = location else {
        // Lists of other types are kept whole
        reader.seek(SeekFrom::Start(chunk.body_offset))?;
        return visitor.visit(reader, chunk.id, chunk.logical_size, ChunkLocation::TopLevel);
    };

    let end = chunk.body_offset.saturating_add(chunk.logical_size);
    let mut pos = chunk.body_offset + 4;
    while pos + 8 <= end {
        reader.seek(SeekFrom::Start(pos))?;
        let header = read_chunk_header(reader, ContainerKind::Riff)?;
        let body = pos + 8;
        let size = header.size.min(end - body);
        if size < header.size {
            log::warn!(
                "{} sub-chunk '{}' at {} overruns its list, truncating to {} bytes",
                chunk.id,
                header.id,
                pos,
                size
            );
        }
        visitor.visit(reader, header.id, size, location)?;
        pos = body.saturating_add(header.padded_size());
    }
    Ok(())
}

/// Arena capacities computed by the counting pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetadataPlan {
    pub records: usize,
    pub loops: usize,
    pub cue_points: usize,
    /// Strings and opaque payloads
    pub bytes: usize,
}

/// Counting pass: sizes the arena without storing anything
#[derive(Debug, Clone, Default)]
pub struct MetadataPlanner {
    keep_unknown: bool,
    plan: MetadataPlan,
}

impl MetadataPlanner {
    pub fn new(keep_unknown: bool) -> Self {
        MetadataPlanner {
            keep_unknown,
            plan: MetadataPlan::default(),
        }
    }

    /// Finished plan. Spans are 32-bit, so larger payload totals are refused.
    pub fn finish(self) -> AudioIOResult<MetadataPlan> {
        let plan = self.plan;
        if plan.bytes > u32::MAX as usize
            || plan.loops > u32::MAX as usize
            || plan.cue_points > u32::MAX as usize
        {
            return Err(AudioIOError::corrupted_data_simple(
                "Metadata too large",
                format!("{} payload bytes requested", plan.bytes),
            ));
        }
        Ok(plan)
    }

    fn add_bytes(&mut self, count: u64) {
        self.plan.bytes = self.plan.bytes.saturating_add(count as usize);
    }
}

impl ChunkVisitor for MetadataPlanner {
    fn visit<R: Read + ?Sized>(
        &mut self,
        reader: &mut R,
        id: ChunkID,
        size: u64,
        location: ChunkLocation,
    ) -> AudioIOResult<()> {
        let kind = classify(id, location);
        if kind == ChunkKind::Ignored || (kind == ChunkKind::Unknown && !self.keep_unknown) {
            return Ok(());
        }
        if size < min_body_size(kind) {
            log::debug!("Skipping undersized '{}' chunk ({} bytes)", id, size);
            return Ok(());
        }

        match kind {
            ChunkKind::Smpl => {
                let header: [u8; 36] = read_array(reader)?;
                let (loops, sampler) = smpl_layout(size, u32_at(&header, 28), u32_at(&header, 32));
                self.plan.loops = self.plan.loops.saturating_add(loops as usize);
                self.add_bytes(sampler);
            }
            ChunkKind::Cue => {
                let count = u32_at(&read_array::<_, 4>(reader)?, 0);
                let points = cue_layout(size, count);
                self.plan.cue_points = self.plan.cue_points.saturating_add(points as usize);
            }
            ChunkKind::Inst | ChunkKind::Acid => {}
            ChunkKind::Bext => self.add_bytes(
                (BEXT_DESCRIPTION_SIZE + BEXT_ORIGINATOR_SIZE + BEXT_ORIGINATOR_REF_SIZE) as u64
                    + (size - BEXT_FIXED_SIZE),
            ),
            ChunkKind::Label | ChunkKind::Note => self.add_bytes(size - CUE_TEXT_FIXED_SIZE),
            ChunkKind::Ltxt => self.add_bytes(size - LTXT_FIXED_SIZE),
            ChunkKind::Info(_) | ChunkKind::Unknown => self.add_bytes(size),
            ChunkKind::Ignored => return Ok(()),
        }
        self.plan.records += 1;
        Ok(())
    }
}

/// Fill pass: stores records into an arena sized by a [`MetadataPlan`]
#[derive(Debug)]
pub(crate) struct MetadataFiller {
    keep_unknown: bool,
    plan: MetadataPlan,
    metadata: Metadata,
}

impl MetadataFiller {
    pub(crate) fn new(plan: MetadataPlan, keep_unknown: bool) -> Self {
        MetadataFiller {
            keep_unknown,
            plan,
            metadata: Metadata::with_plan(&plan),
        }
    }

    pub(crate) fn finish(self) -> Metadata {
        self.metadata
    }

    fn overflow(what: &str) -> AudioIOError {
        AudioIOError::corrupted_data_simple(
            "Metadata changed between passes",
            format!("{} exceed the counted capacity", what),
        )
    }

    fn push_record(&mut self, record: MetadataRecord) -> AudioIOResult<()> {
        if self.metadata.records.len() >= self.plan.records {
            return Err(Self::overflow("records"));
        }
        self.metadata.records.push(record);
        Ok(())
    }

    /// Read `count` bytes into the byte pool, dropping trailing NULs when `trim`
    fn read_bytes<R: Read + ?Sized>(
        &mut self,
        reader: &mut R,
        count: u64,
        trim: bool,
    ) -> AudioIOResult<Span> {
        let start = self.metadata.bytes.len();
        let count = count as usize;
        if start + count > self.plan.bytes {
            return Err(Self::overflow("payload bytes"));
        }
        self.metadata.bytes.resize(start + count, 0);
        reader.read_exact(&mut self.metadata.bytes[start..])?;
        Ok(self.finish_span(start, trim))
    }

    /// Copy an in-memory field into the byte pool
    fn store_field(&mut self, field: &[u8], trim: bool) -> AudioIOResult<Span> {
        let start = self.metadata.bytes.len();
        if start + field.len() > self.plan.bytes {
            return Err(Self::overflow("payload bytes"));
        }
        self.metadata.bytes.extend_from_slice(field);
        Ok(self.finish_span(start, trim))
    }

    fn finish_span(&mut self, start: usize, trim: bool) -> Span {
        if trim {
            while self.metadata.bytes.len() > start && self.metadata.bytes.last() == Some(&0) {
                self.metadata.bytes.pop();
            }
        }
        Span {
            start: start as u32,
            len: (self.metadata.bytes.len() - start) as u32,
        }
    }

    fn read_smpl<R: Read + ?Sized>(&mut self, reader: &mut R, size: u64) -> AudioIOResult<()> {
        let header: [u8; 36] = read_array(reader)?;
        let (loop_count, sampler_size) =
            smpl_layout(size, u32_at(&header, 28), u32_at(&header, 32));
        if self.metadata.loops.len() + loop_count as usize > self.plan.loops {
            return Err(Self::overflow("sample loops"));
        }

        let start = self.metadata.loops.len() as u32;
        for _ in 0..loop_count {
            let raw: [u8; 24] = read_array(reader)?;
            self.metadata.loops.push(SampleLoop {
                cue_point_id: u32_at(&raw, 0),
                loop_type: u32_at(&raw, 4),
                first: u32_at(&raw, 8),
                last: u32_at(&raw, 12),
                fraction: u32_at(&raw, 16),
                play_count: u32_at(&raw, 20),
            });
        }
        let sampler_data = self.read_bytes(reader, sampler_size, false)?;

        self.push_record(MetadataRecord::Smpl(Smpl {
            info: SamplerInfo {
                manufacturer: u32_at(&header, 0),
                product: u32_at(&header, 4),
                sample_period: u32_at(&header, 8),
                midi_unity_note: u32_at(&header, 12),
                midi_pitch_fraction: u32_at(&header, 16),
                smpte_format: u32_at(&header, 20),
                smpte_offset: u32_at(&header, 24),
            },
            loops: Span {
                start,
                len: loop_count as u32,
            },
            sampler_data,
        }))
    }

    fn read_cue<R: Read + ?Sized>(&mut self, reader: &mut R, size: u64) -> AudioIOResult<()> {
        let count = cue_layout(size, u32_at(&read_array::<_, 4>(reader)?, 0));
        if self.metadata.cue_points.len() + count as usize > self.plan.cue_points {
            return Err(Self::overflow("cue points"));
        }

        let start = self.metadata.cue_points.len() as u32;
        for _ in 0..count {
            let raw: [u8; 24] = read_array(reader)?;
            self.metadata.cue_points.push(CuePoint {
                id: u32_at(&raw, 0),
                play_order_position: u32_at(&raw, 4),
                data_chunk_id: [raw[8], raw[9], raw[10], raw[11]],
                chunk_start: u32_at(&raw, 12),
                block_start: u32_at(&raw, 16),
                sample_byte_offset: u32_at(&raw, 20),
            });
        }
        self.push_record(MetadataRecord::Cue(Cue {
            points: Span {
                start,
                len: count as u32,
            },
        }))
    }

    fn read_bext<R: Read + ?Sized>(&mut self, reader: &mut R, size: u64) -> AudioIOResult<()> {
        let raw: [u8; BEXT_FIXED_SIZE as usize] = read_array(reader)?;
        let description = self.store_field(&raw[0..256], true)?;
        let originator_name = self.store_field(&raw[256..288], true)?;
        let originator_reference = self.store_field(&raw[288..320], true)?;

        let mut info = BextInfo::default();
        info.origination_date.copy_from_slice(&raw[320..330]);
        info.origination_time.copy_from_slice(&raw[330..338]);
        info.time_reference = u64_at(&raw, 338);
        info.version = u16_at(&raw, 346);
        info.umid.copy_from_slice(&raw[348..412]);
        info.loudness_value = i16_at(&raw, 412);
        info.loudness_range = i16_at(&raw, 414);
        info.max_true_peak_level = i16_at(&raw, 416);
        info.max_momentary_loudness = i16_at(&raw, 418);
        info.max_short_term_loudness = i16_at(&raw, 420);

        let coding_history = self.read_bytes(reader, size - BEXT_FIXED_SIZE, true)?;
        self.push_record(MetadataRecord::Bext(Bext {
            info,
            description,
            originator_name,
            originator_reference,
            coding_history,
        }))
    }
}

impl ChunkVisitor for MetadataFiller {
    fn visit<R: Read + ?Sized>(
        &mut self,
        reader: &mut R,
        id: ChunkID,
        size: u64,
        location: ChunkLocation,
    ) -> AudioIOResult<()> {
        let kind = classify(id, location);
        if kind == ChunkKind::Ignored || (kind == ChunkKind::Unknown && !self.keep_unknown) {
            return Ok(());
        }
        if size < min_body_size(kind) {
            return Ok(());
        }
        log::debug!("Reading metadata chunk '{}' ({} bytes)", id, size);

        match kind {
            ChunkKind::Smpl => self.read_smpl(reader, size),
            ChunkKind::Cue => self.read_cue(reader, size),
            ChunkKind::Inst => {
                let raw: [u8; 7] = read_array(reader)?;
                self.push_record(MetadataRecord::Inst(Inst {
                    midi_unity_note: raw[0] as i8,
                    fine_tune_cents: raw[1] as i8,
                    gain_decibels: raw[2] as i8,
                    low_note: raw[3] as i8,
                    high_note: raw[4] as i8,
                    low_velocity: raw[5] as i8,
                    high_velocity: raw[6] as i8,
                }))
            }
            ChunkKind::Acid => {
                let raw: [u8; 24] = read_array(reader)?;
                self.push_record(MetadataRecord::Acid(Acid {
                    flags: u32_at(&raw, 0),
                    midi_unity_note: u16_at(&raw, 4),
                    reserved1: u16_at(&raw, 6),
                    reserved2: f32_at(&raw, 8),
                    num_beats: u32_at(&raw, 12),
                    meter_denominator: u16_at(&raw, 16),
                    meter_numerator: u16_at(&raw, 18),
                    tempo: f32_at(&raw, 20),
                }))
            }
            ChunkKind::Bext => self.read_bext(reader, size),
            ChunkKind::Label | ChunkKind::Note => {
                let cue_point_id = u32_at(&read_array::<_, 4>(reader)?, 0);
                let text = self.read_bytes(reader, size - CUE_TEXT_FIXED_SIZE, true)?;
                let entry = CueText { cue_point_id, text };
                self.push_record(if kind == ChunkKind::Label {
                    MetadataRecord::Label(entry)
                } else {
                    MetadataRecord::Note(entry)
                })
            }
            ChunkKind::Ltxt => {
                let raw: [u8; 20] = read_array(reader)?;
                let text = self.read_bytes(reader, size - LTXT_FIXED_SIZE, true)?;
                self.push_record(MetadataRecord::LabelledCueRegion(LabelledCueRegion {
                    info: RegionInfo {
                        cue_point_id: u32_at(&raw, 0),
                        sample_length: u32_at(&raw, 4),
                        purpose_id: [raw[8], raw[9], raw[10], raw[11]],
                        country: u16_at(&raw, 12),
                        language: u16_at(&raw, 14),
                        dialect: u16_at(&raw, 16),
                        code_page: u16_at(&raw, 18),
                    },
                    text,
                }))
            }
            ChunkKind::Info(tag) => {
                let text = self.read_bytes(reader, size, true)?;
                self.push_record(MetadataRecord::InfoText(InfoText { tag, text }))
            }
            ChunkKind::Unknown => {
                let data = self.read_bytes(reader, size, false)?;
                self.push_record(MetadataRecord::Unknown(UnknownChunk { id, location, data }))
            }
            ChunkKind::Ignored => Ok(()),
        }
    }
}

/// Run both passes over `chunks` and return the filled arena
pub(crate) fn read_metadata<R: Read + Seek + ?Sized>(
    reader: &mut R,
    chunks: &[ChunkDesc],
    keep_unknown: bool,
) -> AudioIOResult<Metadata> {
    let mut planner = MetadataPlanner::new(keep_unknown);
    walk_chunks(reader, chunks, &mut planner)?;
    let plan = planner.finish()?;
    log::debug!(
        "Metadata plan: {} records, {} loops, {} cue points, {} bytes",
        plan.records,
        plan.loops,
        plan.cue_points,
        plan.bytes
    );

    let mut filler = MetadataFiller::new(plan, keep_unknown);
    walk_chunks(reader, chunks, &mut filler)?;
    Ok(filler.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wav::chunks::ChunkHeader;
    use std::io::Cursor;

    /// Lay out top-level chunks back to back and describe them
    fn layout(chunks: &[(&[u8; 4], Vec<u8>)]) -> (Vec<u8>, Vec<ChunkDesc>) {
        let mut bytes = Vec::new();
        let mut descs = Vec::new();
        for (id, body) in chunks {
            let offset = bytes.len() as u64;
            bytes.extend_from_slice(*id);
            bytes.extend_from_slice(&(body.len() as u32).to_le_bytes());
            bytes.extend_from_slice(body);
            if body.len() % 2 == 1 {
                bytes.push(0);
            }
            let header = ChunkHeader {
                id: ChunkID::new(id),
                guid: None,
                size: body.len() as u64,
                padding: body.len() as u64 % 2,
            };
            descs.push(ChunkDesc::new(offset, ContainerKind::Riff, &header).unwrap());
        }
        (bytes, descs)
    }

    fn sub_chunk(id: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = id.to_vec();
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        out.extend_from_slice(body);
        if body.len() % 2 == 1 {
            out.push(0);
        }
        out
    }

    fn smpl_body() -> Vec<u8> {
        let mut body = Vec::new();
        for value in [1u32, 2, 22_675, 60, 0, 0, 0, 1, 3] {
            body.extend_from_slice(&value.to_le_bytes());
        }
        for value in [7u32, 0, 100, 2000, 0, 0] {
            body.extend_from_slice(&value.to_le_bytes());
        }
        body.extend_from_slice(&[0xAA, 0xBB, 0xCC]);
        body
    }

    #[test]
    fn test_smpl_and_info_list() {
        let mut info = b"INFO".to_vec();
        info.extend(sub_chunk(b"INAM", b"Song\0"));
        info.extend(sub_chunk(b"IART", b"Band\0"));
        let (bytes, descs) = layout(&[(b"smpl", smpl_body()), (b"LIST", info)]);

        let metadata = read_metadata(&mut Cursor::new(bytes), &descs, true).unwrap();
        assert_eq!(metadata.len(), 3);
        let MetadataRecord::Smpl(smpl) = metadata.records()[0] else {
            panic!("expected smpl");
        };
        assert_eq!(smpl.info.sample_period, 22_675);
        assert_eq!(smpl.info.midi_unity_note, 60);
        let loops = metadata.loops(&smpl);
        assert_eq!(loops.len(), 1);
        assert_eq!((loops[0].cue_point_id, loops[0].first, loops[0].last), (7, 100, 2000));
        assert_eq!(metadata.bytes(smpl.sampler_data), &[0xAA, 0xBB, 0xCC]);
        assert_eq!(metadata.info(InfoTag::Title).as_deref(), Some("Song"));
        assert_eq!(metadata.info(InfoTag::Artist).as_deref(), Some("Band"));
    }

    #[test]
    fn test_plan_matches_fill() {
        let mut adtl = b"adtl".to_vec();
        let mut labl = 1u32.to_le_bytes().to_vec();
        labl.extend_from_slice(b"intro\0");
        adtl.extend(sub_chunk(b"labl", &labl));
        let mut ltxt = 1u32.to_le_bytes().to_vec();
        ltxt.extend_from_slice(&4410u32.to_le_bytes());
        ltxt.extend_from_slice(b"rgn ");
        ltxt.extend_from_slice(&[0u8; 8]);
        ltxt.extend_from_slice(b"region");
        adtl.extend(sub_chunk(b"ltxt", &ltxt));
        let mut cue = 2u32.to_le_bytes().to_vec();
        for id in [1u32, 2] {
            for value in [id, 0] {
                cue.extend_from_slice(&value.to_le_bytes());
            }
            cue.extend_from_slice(b"data");
            for value in [0u32, 0, id * 100] {
                cue.extend_from_slice(&value.to_le_bytes());
            }
        }
        let (bytes, descs) = layout(&[(b"cue ", cue), (b"LIST", adtl)]);
        let mut cursor = Cursor::new(bytes);

        let mut planner = MetadataPlanner::new(true);
        walk_chunks(&mut cursor, &descs, &mut planner).unwrap();
        let plan = planner.finish().unwrap();
        assert_eq!(plan.records, 3);
        assert_eq!(plan.cue_points, 2);
        assert_eq!(plan.bytes, 6 + 6);

        let mut filler = MetadataFiller::new(plan, true);
        walk_chunks(&mut cursor, &descs, &mut filler).unwrap();
        let metadata = filler.finish();
        assert_eq!(metadata.len(), plan.records);
        assert_eq!(metadata.cue_points.len(), plan.cue_points);

        let MetadataRecord::Cue(cue) = metadata.records()[0] else {
            panic!("expected cue");
        };
        let points = metadata.cue_points(&cue);
        assert_eq!(points[1].sample_byte_offset, 200);
        assert_eq!(&points[1].data_chunk_id, b"data");
        let MetadataRecord::Label(label) = metadata.records()[1] else {
            panic!("expected label");
        };
        assert_eq!(metadata.text(label.text), "intro");
        let MetadataRecord::LabelledCueRegion(region) = metadata.records()[2] else {
            panic!("expected ltxt");
        };
        assert_eq!(region.info.sample_length, 4410);
        assert_eq!(&region.info.purpose_id, b"rgn ");
        assert_eq!(metadata.text(region.text), "region");
    }

    #[test]
    fn test_unknown_chunks_respect_option() {
        let mut info = b"INFO".to_vec();
        info.extend(sub_chunk(b"IKEY", b"C#\0"));
        let (bytes, descs) = layout(&[(b"XYZW", vec![1, 2, 3]), (b"LIST", info)]);

        let kept = read_metadata(&mut Cursor::new(bytes.clone()), &descs, true).unwrap();
        assert_eq!(kept.len(), 2);
        let MetadataRecord::Unknown(top) = kept.records()[0] else {
            panic!("expected unknown");
        };
        assert_eq!(top.location, ChunkLocation::TopLevel);
        assert_eq!(kept.bytes(top.data), &[1, 2, 3]);
        let MetadataRecord::Unknown(nested) = kept.records()[1] else {
            panic!("expected unknown");
        };
        assert_eq!(nested.location, ChunkLocation::InfoList);
        assert_eq!(nested.id, ChunkID::new(b"IKEY"));

        let dropped = read_metadata(&mut Cursor::new(bytes), &descs, false).unwrap();
        assert!(dropped.is_empty());
    }

    #[test]
    fn test_other_list_types_kept_whole() {
        let mut list = b"exif".to_vec();
        list.extend(sub_chunk(b"ever", b"1"));
        let (bytes, descs) = layout(&[(b"LIST", list.clone())]);
        let metadata = read_metadata(&mut Cursor::new(bytes), &descs, true).unwrap();
        let MetadataRecord::Unknown(unknown) = metadata.records()[0] else {
            panic!("expected unknown");
        };
        assert_eq!(unknown.id, LIST_CHUNK);
        assert_eq!(metadata.bytes(unknown.data), &list[..]);
    }

    #[test]
    fn test_loop_count_clamped_to_chunk() {
        let mut body = smpl_body();
        // Claim 50 loops in a chunk that holds one
        body[28..32].copy_from_slice(&50u32.to_le_bytes());
        body.truncate(36 + 24);
        let (bytes, descs) = layout(&[(b"smpl", body)]);
        let metadata = read_metadata(&mut Cursor::new(bytes), &descs, true).unwrap();
        let MetadataRecord::Smpl(smpl) = metadata.records()[0] else {
            panic!("expected smpl");
        };
        assert_eq!(metadata.loops(&smpl).len(), 1);
        assert!(metadata.bytes(smpl.sampler_data).is_empty());
    }

    #[test]
    fn test_structural_chunks_ignored() {
        let (bytes, descs) = layout(&[(b"JUNK", vec![0; 10]), (b"fact", vec![0; 4])]);
        let metadata = read_metadata(&mut Cursor::new(bytes), &descs, true).unwrap();
        assert!(metadata.is_empty());
    }

    #[test]
    fn test_fill_overflow_is_corrupt() {
        let (bytes, descs) = layout(&[(b"inst", vec![60, 0, 0, 0, 127, 1, 127])]);
        let mut filler = MetadataFiller::new(MetadataPlan::default(), true);
        let err = walk_chunks(&mut Cursor::new(bytes), &descs, &mut filler).unwrap_err();
        assert!(matches!(err, AudioIOError::CorruptedData { .. }));
    }
}
