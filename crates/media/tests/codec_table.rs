use beqwatch_core::types::CodecName;
use beqwatch_media::codec::normalize;

#[test]
fn normalizes_media_server_stream_titles() {
    let table: &[(&str, &str, CodecName)] = &[
        ("EAC3 5.1", "German EAC3 5.1", CodecName::DdPlusAtmos51Maybe),
        ("EAC3 7.1", "English (EAC3 7.1)", CodecName::DdPlusAtmos71Maybe),
        ("TRUEHD 7.1", "TrueHD Atmos 7.1", CodecName::Atmos),
        ("DDP 5.1 Atmos", "English (DDP 5.1 Atmos)", CodecName::DdPlusAtmos),
        ("DTS-HD MA 7.1", "DTS:X 7.1 (English)", CodecName::DtsX),
        ("DTS-HD MA 7.1", "English (DTS-X 7.1)", CodecName::DtsX),
        ("DTS-HD MA 7.1", "English (DTS-HD MA 7.1)", CodecName::DtsHdMa71),
        ("TRUEHD 7.1", "English (TRUEHD 7.1)", CodecName::AtmosMaybe),
        ("TRUEHD 7.1", "English (TRUEHD Surround 7.1)", CodecName::AtmosMaybe),
        ("DTS-HD MA 5.1", "English (DTS-HD MA 5.1)", CodecName::DtsHdMa51),
        ("DTS 5.1", "English (DTS 5.1)", CodecName::Dts51),
        ("TRUEHD 5.1", "English (TRUEHD 5.1)", CodecName::TrueHd51),
        ("TRUEHD 6.1", "English (TRUEHD 6.1)", CodecName::TrueHd61),
        ("DTS-HD HRA 7.1", "English (DTS-HD HRA 7.1)", CodecName::DtsHdHr71),
        ("DTS-HD HRA 5.1", "English (DTS-HD HRA 5.1)", CodecName::DtsHdHr51),
        ("LPCM 5.1", "English (LPCM 5.1)", CodecName::Lpcm51),
        ("LPCM 7.1", "English (LPCM 7.1)", CodecName::Lpcm71),
        ("LPCM 2.0", "English (LPCM 2.0)", CodecName::Lpcm20),
        ("AAC Stereo", "English (AAC Stereo)", CodecName::Aac20),
        ("AC3 5.1", "English (AC3 5.1)", CodecName::Ac351),
        ("FLAC 2.0", "English (FLAC Stereo)", CodecName::Empty),
    ];

    for (title, extended, expected) in table {
        let got = normalize(title, extended);
        assert_eq!(got, *expected, "normalize({title:?}, {extended:?})");
        // same inputs, same answer
        assert_eq!(normalize(title, extended), got);
    }
}
