//! Metadata serialization.
//!
//! Top-level records become one chunk each, in arena order. INFO text is
//! collected into a single `LIST INFO` and label/note/region entries into a
//! single `LIST adtl`, both emitted after the top-level chunks. Unknown
//! chunks are written back at the location they were read from.

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::{
    error::{AudioIOError, AudioIOResult},
    types::ContainerKind,
    wav::{
        chunks::{
            ACID_CHUNK, ADTL_LIST, BEXT_CHUNK, CUE_CHUNK, ChunkID, INFO_LIST, INST_CHUNK,
            LABL_CHUNK, LIST_CHUNK, LTXT_CHUNK, NOTE_CHUNK, SMPL_CHUNK, chunk_padding,
            write_chunk_header,
        },
        endian::{write_u16, write_u32, write_u64},
    },
};

use super::{
    ChunkLocation, Metadata, MetadataRecord, Span,
    parse::{
        ACID_SIZE, BEXT_DESCRIPTION_SIZE, BEXT_FIXED_SIZE, BEXT_ORIGINATOR_REF_SIZE,
        BEXT_ORIGINATOR_SIZE, CUE_POINT_SIZE, CUE_TEXT_FIXED_SIZE, INST_SIZE, LTXT_FIXED_SIZE,
        SAMPLE_LOOP_SIZE, SMPL_HEADER_SIZE,
    },
};

const BEXT_RESERVED_SIZE: usize = 180;

const fn location_of(record: &MetadataRecord) -> ChunkLocation {
    match record {
        MetadataRecord::Smpl(_)
        | MetadataRecord::Cue(_)
        | MetadataRecord::Inst(_)
        | MetadataRecord::Acid(_)
        | MetadataRecord::Bext(_) => ChunkLocation::TopLevel,
        MetadataRecord::InfoText(_) => ChunkLocation::InfoList,
        MetadataRecord::Label(_)
        | MetadataRecord::Note(_)
        | MetadataRecord::LabelledCueRegion(_) => ChunkLocation::AdtlList,
        MetadataRecord::Unknown(unknown) => unknown.location,
    }
}

const fn chunk_id_of(record: &MetadataRecord) -> ChunkID {
    match record {
        MetadataRecord::Smpl(_) => SMPL_CHUNK,
        MetadataRecord::Cue(_) => CUE_CHUNK,
        MetadataRecord::Inst(_) => INST_CHUNK,
        MetadataRecord::Acid(_) => ACID_CHUNK,
        MetadataRecord::Bext(_) => BEXT_CHUNK,
        MetadataRecord::Label(_) => LABL_CHUNK,
        MetadataRecord::Note(_) => NOTE_CHUNK,
        MetadataRecord::LabelledCueRegion(_) => LTXT_CHUNK,
        MetadataRecord::InfoText(info) => info.tag.chunk_id(),
        MetadataRecord::Unknown(unknown) => unknown.id,
    }
}

/// Null-terminated text size
fn text_size(metadata: &Metadata, span: Span) -> u64 {
    metadata.bytes(span).len() as u64 + 1
}

fn body_size(record: &MetadataRecord, metadata: &Metadata) -> u64 {
    match record {
        MetadataRecord::Smpl(smpl) => {
            SMPL_HEADER_SIZE
                + metadata.loops(smpl).len() as u64 * SAMPLE_LOOP_SIZE
                + metadata.bytes(smpl.sampler_data).len() as u64
        }
        MetadataRecord::Cue(cue) => 4 + metadata.cue_points(cue).len() as u64 * CUE_POINT_SIZE,
        MetadataRecord::Inst(_) => INST_SIZE,
        MetadataRecord::Acid(_) => ACID_SIZE,
        MetadataRecord::Bext(bext) => {
            match metadata.bytes(bext.coding_history).len() as u64 {
                0 => BEXT_FIXED_SIZE,
                history => BEXT_FIXED_SIZE + history + 1,
            }
        }
        MetadataRecord::Label(entry) | MetadataRecord::Note(entry) => {
            CUE_TEXT_FIXED_SIZE + text_size(metadata, entry.text)
        }
        MetadataRecord::LabelledCueRegion(region) => {
            LTXT_FIXED_SIZE + text_size(metadata, region.text)
        }
        MetadataRecord::InfoText(info) => text_size(metadata, info.text),
        MetadataRecord::Unknown(unknown) => metadata.bytes(unknown.data).len() as u64,
    }
}

const fn padded(size: u64) -> u64 {
    size + chunk_padding(ContainerKind::Riff, size)
}

/// Body size of the `LIST` chunk holding every record at `location`,
/// or `None` if no record lives there
fn list_body_size(metadata: &Metadata, location: ChunkLocation) -> Option<u64> {
    let mut size = 4;
    let mut any = false;
    for record in metadata.iter().filter(|r| location_of(r) == location) {
        size += 8 + padded(body_size(record, metadata));
        any = true;
    }
    any.then_some(size)
}

/// Bytes [`write_metadata`] emits for `metadata`, headers and padding included
pub fn metadata_size(metadata: &Metadata) -> u64 {
    let top: u64 = metadata
        .iter()
        .filter(|r| location_of(r) == ChunkLocation::TopLevel)
        .map(|r| 8 + padded(body_size(r, metadata)))
        .sum();
    let lists: u64 = [ChunkLocation::InfoList, ChunkLocation::AdtlList]
        .into_iter()
        .filter_map(|location| list_body_size(metadata, location))
        .map(|size| 8 + padded(size))
        .sum();
    top + lists
}

fn check_chunk_size(id: ChunkID, size: u64) -> AudioIOResult<()> {
    if size > u32::MAX as u64 {
        return Err(AudioIOError::invalid_parameters(format!(
            "Metadata chunk '{}' of {} bytes does not fit a 32-bit size field",
            id, size
        )));
    }
    Ok(())
}

/// Copy `text` into a fixed-width bext field, truncating and zero filling
fn write_fixed_text<W: Write + ?Sized>(
    writer: &mut W,
    text: &[u8],
    width: usize,
) -> AudioIOResult<()> {
    let len = text.len().min(width);
    writer.write_all(&text[..len])?;
    writer.write_all(&[0u8; BEXT_DESCRIPTION_SIZE][..width - len])?;
    Ok(())
}

fn write_text<W: Write + ?Sized>(
    writer: &mut W,
    metadata: &Metadata,
    span: Span,
) -> AudioIOResult<()> {
    writer.write_all(metadata.bytes(span))?;
    writer.write_all(&[0])?;
    Ok(())
}

fn write_body<W: Write + ?Sized>(
    writer: &mut W,
    record: &MetadataRecord,
    metadata: &Metadata,
) -> AudioIOResult<()> {
    match record {
        MetadataRecord::Smpl(smpl) => {
            let info = &smpl.info;
            let loops = metadata.loops(smpl);
            let sampler_data = metadata.bytes(smpl.sampler_data);
            for value in [
                info.manufacturer,
                info.product,
                info.sample_period,
                info.midi_unity_note,
                info.midi_pitch_fraction,
                info.smpte_format,
                info.smpte_offset,
                loops.len() as u32,
                sampler_data.len() as u32,
            ] {
                write_u32(writer, value)?;
            }
            for sample_loop in loops {
                for value in [
                    sample_loop.cue_point_id,
                    sample_loop.loop_type,
                    sample_loop.first,
                    sample_loop.last,
                    sample_loop.fraction,
                    sample_loop.play_count,
                ] {
                    write_u32(writer, value)?;
                }
            }
            writer.write_all(sampler_data)?;
        }
        MetadataRecord::Cue(cue) => {
            let points = metadata.cue_points(cue);
            write_u32(writer, points.len() as u32)?;
            for point in points {
                write_u32(writer, point.id)?;
                write_u32(writer, point.play_order_position)?;
                writer.write_all(&point.data_chunk_id)?;
                write_u32(writer, point.chunk_start)?;
                write_u32(writer, point.block_start)?;
                write_u32(writer, point.sample_byte_offset)?;
            }
        }
        MetadataRecord::Inst(inst) => {
            for value in [
                inst.midi_unity_note,
                inst.fine_tune_cents,
                inst.gain_decibels,
                inst.low_note,
                inst.high_note,
                inst.low_velocity,
                inst.high_velocity,
            ] {
                writer.write_i8(value)?;
            }
        }
        MetadataRecord::Acid(acid) => {
            write_u32(writer, acid.flags)?;
            write_u16(writer, acid.midi_unity_note)?;
            write_u16(writer, acid.reserved1)?;
            writer.write_f32::<LittleEndian>(acid.reserved2)?;
            write_u32(writer, acid.num_beats)?;
            write_u16(writer, acid.meter_denominator)?;
            write_u16(writer, acid.meter_numerator)?;
            writer.write_f32::<LittleEndian>(acid.tempo)?;
        }
        MetadataRecord::Bext(bext) => {
            let info = &bext.info;
            write_fixed_text(writer, metadata.bytes(bext.description), BEXT_DESCRIPTION_SIZE)?;
            write_fixed_text(writer, metadata.bytes(bext.originator_name), BEXT_ORIGINATOR_SIZE)?;
            write_fixed_text(
                writer,
                metadata.bytes(bext.originator_reference),
                BEXT_ORIGINATOR_REF_SIZE,
            )?;
            writer.write_all(&info.origination_date)?;
            writer.write_all(&info.origination_time)?;
            write_u64(writer, info.time_reference)?;
            write_u16(writer, info.version)?;
            writer.write_all(&info.umid)?;
            for value in [
                info.loudness_value,
                info.loudness_range,
                info.max_true_peak_level,
                info.max_momentary_loudness,
                info.max_short_term_loudness,
            ] {
                writer.write_i16::<LittleEndian>(value)?;
            }
            writer.write_all(&[0u8; BEXT_RESERVED_SIZE])?;
            if !metadata.bytes(bext.coding_history).is_empty() {
                write_text(writer, metadata, bext.coding_history)?;
            }
        }
        MetadataRecord::Label(entry) | MetadataRecord::Note(entry) => {
            write_u32(writer, entry.cue_point_id)?;
            write_text(writer, metadata, entry.text)?;
        }
        MetadataRecord::LabelledCueRegion(region) => {
            let info = &region.info;
            write_u32(writer, info.cue_point_id)?;
            write_u32(writer, info.sample_length)?;
            writer.write_all(&info.purpose_id)?;
            write_u16(writer, info.country)?;
            write_u16(writer, info.language)?;
            write_u16(writer, info.dialect)?;
            write_u16(writer, info.code_page)?;
            write_text(writer, metadata, region.text)?;
        }
        MetadataRecord::InfoText(info) => write_text(writer, metadata, info.text)?,
        MetadataRecord::Unknown(unknown) => writer.write_all(metadata.bytes(unknown.data))?,
    }
    Ok(())
}

fn write_chunk<W: Write + ?Sized>(
    writer: &mut W,
    record: &MetadataRecord,
    metadata: &Metadata,
) -> AudioIOResult<u64> {
    let id = chunk_id_of(record);
    let size = body_size(record, metadata);
    check_chunk_size(id, size)?;
    write_chunk_header(writer, ContainerKind::Riff, id, size)?;
    write_body(writer, record, metadata)?;
    if size % 2 == 1 {
        writer.write_all(&[0])?;
    }
    Ok(8 + padded(size))
}

/// Serialize every record as RIFF chunks. Returns the number of bytes written.
pub fn write_metadata<W: Write + ?Sized>(
    writer: &mut W,
    metadata: &Metadata,
) -> AudioIOResult<u64> {
    let mut written = 0;
    for record in metadata
        .iter()
        .filter(|r| location_of(r) == ChunkLocation::TopLevel)
    {
        written += write_chunk(writer, record, metadata)?;
    }

    for (location, list_type) in [
        (ChunkLocation::InfoList, INFO_LIST),
        (ChunkLocation::AdtlList, ADTL_LIST),
    ] {
        let Some(size) = list_body_size(metadata, location) else {
            continue;
        };
        check_chunk_size(LIST_CHUNK, size)?;
        write_chunk_header(writer, ContainerKind::Riff, LIST_CHUNK, size)?;
        writer.write_all(list_type.as_bytes())?;
        for record in metadata.iter().filter(|r| location_of(r) == location) {
            write_chunk(writer, record, metadata)?;
        }
        written += 8 + size;
    }

    log::debug!("Wrote {} records in {} metadata bytes", metadata.len(), written);
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wav::{
        chunks::{ChunkDesc, read_chunk_header},
        metadata::{
            BextInfo, CuePoint, InfoTag, Inst, RegionInfo, SampleLoop, SamplerInfo,
            parse::read_metadata,
        },
    };
    use std::io::Cursor;

    fn describe(bytes: &[u8]) -> Vec<ChunkDesc> {
        let mut cursor = Cursor::new(bytes);
        let mut descs = Vec::new();
        while (cursor.position() as usize) < bytes.len() {
            let offset = cursor.position();
            let header = read_chunk_header(&mut cursor, ContainerKind::Riff).unwrap();
            let desc = ChunkDesc::new(offset, ContainerKind::Riff, &header).unwrap();
            cursor.set_position(desc.end_offset());
            descs.push(desc);
        }
        descs
    }

    fn sample_metadata() -> Metadata {
        let mut bext_info = BextInfo::default();
        bext_info.origination_date.copy_from_slice(b"2024-01-31");
        bext_info.time_reference = 48_000 * 3600;
        bext_info.version = 2;
        bext_info.loudness_value = -2300;

        Metadata::builder()
            .info_text(InfoTag::Title, "Field recording")
            .sampler(
                SamplerInfo {
                    sample_period: 20_833,
                    midi_unity_note: 60,
                    ..Default::default()
                },
                &[SampleLoop {
                    cue_point_id: 1,
                    first: 10,
                    last: 99,
                    ..Default::default()
                }],
                &[],
            )
            .cue_points(&[CuePoint {
                id: 1,
                data_chunk_id: *b"data",
                sample_byte_offset: 10,
                ..Default::default()
            }])
            .instrument(Inst {
                midi_unity_note: 60,
                low_note: 0,
                high_note: 127,
                low_velocity: 1,
                high_velocity: 127,
                ..Default::default()
            })
            .bext(bext_info, "Dawn chorus", "wav_codec", "REF-1", "A=PCM,F=48000")
            .label(1, "start")
            .labelled_region(
                RegionInfo {
                    cue_point_id: 1,
                    sample_length: 90,
                    purpose_id: *b"rgn ",
                    ..Default::default()
                },
                "loop",
            )
            .info_text(InfoTag::Artist, "Nobody")
            .build()
    }

    #[test]
    fn test_size_matches_output() {
        let metadata = sample_metadata();
        let mut out = Vec::new();
        let written = write_metadata(&mut out, &metadata).unwrap();
        assert_eq!(written, out.len() as u64);
        assert_eq!(metadata_size(&metadata), written);
        assert_eq!(out.len() % 2, 0);
    }

    #[test]
    fn test_lists_follow_top_level_chunks() {
        let mut out = Vec::new();
        write_metadata(&mut out, &sample_metadata()).unwrap();
        let ids: Vec<ChunkID> = describe(&out).iter().map(|d| d.id).collect();
        assert_eq!(
            ids,
            [SMPL_CHUNK, CUE_CHUNK, INST_CHUNK, BEXT_CHUNK, LIST_CHUNK, LIST_CHUNK]
        );
        let descs = describe(&out);
        let info_list = &out[descs[4].body_offset as usize..][..4];
        assert_eq!(info_list, b"INFO");
    }

    #[test]
    fn test_roundtrip_through_parser() {
        let metadata = sample_metadata();
        let mut out = Vec::new();
        write_metadata(&mut out, &metadata).unwrap();
        let descs = describe(&out);
        let parsed = read_metadata(&mut Cursor::new(&out), &descs, true).unwrap();

        assert_eq!(parsed.len(), metadata.len());
        assert_eq!(parsed.info(InfoTag::Title).as_deref(), Some("Field recording"));
        assert_eq!(parsed.info(InfoTag::Artist).as_deref(), Some("Nobody"));

        for kind in ["smpl", "cue", "inst", "bext", "labl", "ltxt"] {
            assert_eq!(parsed.count_kind(kind), 1, "{kind}");
        }
        let bext = parsed.iter().find_map(|r| match r {
            MetadataRecord::Bext(bext) => Some(*bext),
            _ => None,
        });
        let bext = bext.unwrap();
        assert_eq!(parsed.text(bext.description), "Dawn chorus");
        assert_eq!(parsed.text(bext.originator_reference), "REF-1");
        assert_eq!(parsed.text(bext.coding_history), "A=PCM,F=48000");
        assert_eq!(&bext.info.origination_date, b"2024-01-31");
        assert_eq!(bext.info.time_reference, 48_000 * 3600);
        assert_eq!(bext.info.loudness_value, -2300);

        let smpl = parsed.iter().find_map(|r| match r {
            MetadataRecord::Smpl(smpl) => Some(*smpl),
            _ => None,
        });
        let smpl = smpl.unwrap();
        assert_eq!(parsed.loops(&smpl)[0].last, 99);
        assert_eq!(smpl.info.sample_period, 20_833);
    }

    #[test]
    fn test_bext_fields_truncated() {
        let long = "x".repeat(300);
        let metadata = Metadata::builder()
            .bext(BextInfo::default(), &long, "", "", "")
            .build();
        let mut out = Vec::new();
        write_metadata(&mut out, &metadata).unwrap();
        assert_eq!(out.len() as u64, 8 + BEXT_FIXED_SIZE);
        let parsed = read_metadata(&mut Cursor::new(&out), &describe(&out), true).unwrap();
        let MetadataRecord::Bext(bext) = parsed.records()[0] else {
            panic!("expected bext");
        };
        assert_eq!(parsed.bytes(bext.description).len(), 256);
        assert!(parsed.bytes(bext.coding_history).is_empty());
    }

    #[test]
    fn test_bext_history_span_outside_arena() {
        let mut metadata = Metadata::builder()
            .bext(BextInfo::default(), "desc", "", "", "history")
            .build();
        let MetadataRecord::Bext(bext) = &mut metadata.records[0] else {
            panic!("expected bext");
        };
        bext.coding_history = Span { start: 4096, len: 8 };
        let mut out = Vec::new();
        let written = write_metadata(&mut out, &metadata).unwrap();
        assert_eq!(written, out.len() as u64);
        assert_eq!(metadata_size(&metadata), written);
        assert_eq!(u32::from_le_bytes(out[4..8].try_into().unwrap()) as u64, BEXT_FIXED_SIZE);
    }

    #[test]
    fn test_unknown_written_in_place() {
        let metadata = Metadata::builder()
            .unknown(ChunkID::new(b"IKEY"), ChunkLocation::InfoList, b"Am\0")
            .unknown(ChunkID::new(b"XYZW"), ChunkLocation::TopLevel, &[9, 8, 7])
            .build();
        let mut out = Vec::new();
        write_metadata(&mut out, &metadata).unwrap();
        // XYZW (8 + 3 + pad) comes first, then the INFO list
        assert_eq!(&out[0..4], b"XYZW");
        assert_eq!(out[11], 0);
        assert_eq!(&out[12..16], b"LIST");
        assert_eq!(&out[20..28], b"INFOIKEY");

        let parsed = read_metadata(&mut Cursor::new(&out), &describe(&out), true).unwrap();
        assert_eq!(parsed.count_kind("unknown"), 2);
    }

    #[test]
    fn test_empty_metadata_writes_nothing() {
        let mut out = Vec::new();
        assert_eq!(write_metadata(&mut out, &Metadata::default()).unwrap(), 0);
        assert!(out.is_empty());
        assert_eq!(metadata_size(&Metadata::default()), 0);
    }
}
