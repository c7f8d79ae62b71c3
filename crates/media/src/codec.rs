use beqwatch_core::types::CodecName;
use tracing::debug;

// Markers that identify a Dolby Digital Plus stream.
static DDP_MARKERS: &[&str] = &["ddp", "eac3", "e-ac3", "dd+"];

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn has_ddp(s: &str) -> bool {
    DDP_MARKERS.iter().any(|m| contains(s, m))
}

/// Map the media server's audio stream titles to a catalog codec.
///
/// `title` is the short display title (`TRUEHD 7.1`), `extended` the long one
/// (`English (TRUEHD 7.1 Surround 7.1)`). Ambiguous inputs produce one of the
/// `*Maybe` codecs; unknown inputs produce [`CodecName::Empty`].
pub fn normalize(title: &str, extended: &str) -> CodecName {
    let atmos = contains(title, "atmos") || contains(extended, "atmos");
    let ddp = has_ddp(title) || has_ddp(extended);
    debug!(title, extended, atmos, ddp, "normalizing codec");

    match (atmos, ddp) {
        (true, false) => return CodecName::Atmos,
        (true, true) => return CodecName::DdPlusAtmos,
        (false, true) => {
            if contains(title, "5.1") {
                return CodecName::DdPlusAtmos51Maybe;
            }
            if contains(title, "7.1") {
                return CodecName::DdPlusAtmos71Maybe;
            }
        }
        (false, false) => {}
    }

    let dtsx = contains(extended, "DTS:X") || contains(extended, "DTS-X");

    // Few releases are genuinely TrueHD 7.1 without Atmos, and much Atmos
    // metadata is mislabeled as such. The catalog search settles it.
    if contains(title, "TrueHD 7.1")
        && (contains(extended, "TrueHD 7.1") || contains(extended, "Surround 7.1"))
    {
        CodecName::AtmosMaybe
    } else if dtsx {
        CodecName::DtsX
    } else if contains(title, "DTS-HD MA 7.1") {
        CodecName::DtsHdMa71
    } else if contains(title, "DTS-HD MA 5.1") {
        CodecName::DtsHdMa51
    } else if contains(title, "DTS 5.1") {
        CodecName::Dts51
    } else if contains(title, "TrueHD 5.1") {
        CodecName::TrueHd51
    } else if contains(title, "TrueHD 6.1") {
        CodecName::TrueHd61
    } else if contains(title, "DTS-HD HRA 7.1") {
        CodecName::DtsHdHr71
    } else if contains(title, "DTS-HD HRA 5.1") {
        CodecName::DtsHdHr51
    } else if contains(title, "LPCM 5.1") {
        CodecName::Lpcm51
    } else if contains(title, "LPCM 7.1") {
        CodecName::Lpcm71
    } else if contains(title, "LPCM 2.0") {
        CodecName::Lpcm20
    } else if contains(title, "AAC Stereo") {
        CodecName::Aac20
    } else if contains(title, "AC3 5.1") || contains(title, "EAC3 5.1") {
        CodecName::Ac351
    } else if contains(title, "EAC3") || contains(extended, "EAC3") {
        CodecName::DdPlus
    } else {
        CodecName::Empty
    }
}

/// Like [`normalize`], but a file name mentioning Atmos wins over stream metadata.
pub fn normalize_with_file(title: &str, extended: &str, file_name: Option<&str>) -> CodecName {
    if let Some(file) = file_name {
        if contains(file, "atmos") {
            debug!(file, "atmos found in file name");
            return CodecName::Atmos;
        }
    }
    normalize(title, extended)
}

/// Map an AVR surround-mode string (Denon `MS?` reply) to a catalog codec.
pub fn map_avr_codec(mode: &str) -> CodecName {
    if contains(mode, "dolby atmos") {
        CodecName::Atmos
    } else if contains(mode, "dolby digital +") || contains(mode, "dolby digital plus") {
        CodecName::DdPlus
    } else if contains(mode, "DTS:X") {
        CodecName::DtsX
    } else if contains(mode, "DTS-HD MA 7.1") && !contains(mode, "DTS-X") {
        CodecName::DtsHdMa71
    } else if contains(mode, "DTS-HD MA 5.1") {
        CodecName::DtsHdMa51
    } else if contains(mode, "DTS 5.1") {
        CodecName::Dts51
    } else if contains(mode, "TrueHD 5.1") {
        CodecName::TrueHd51
    } else if contains(mode, "TrueHD 6.1") {
        CodecName::TrueHd61
    } else if contains(mode, "DTS-HD HRA 7.1") {
        CodecName::DtsHdHr71
    } else if contains(mode, "DTS-HD HRA 5.1") {
        CodecName::DtsHdHr51
    } else if contains(mode, "LPCM 5.1") {
        CodecName::Lpcm51
    } else if contains(mode, "LPCM 7.1") {
        CodecName::Lpcm71
    } else if contains(mode, "LPCM 2.0") {
        CodecName::Lpcm20
    } else if contains(mode, "AAC Stereo") {
        CodecName::Aac20
    } else if contains(mode, "AC3 5.1") || contains(mode, "EAC3 5.1") {
        CodecName::Ac351
    } else if contains(mode, "stereo") {
        CodecName::Stereo
    } else {
        CodecName::Empty
    }
}
