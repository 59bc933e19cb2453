//! Small valid media files for tests.

/// SOI + APP0 header; enough for MIME sniffing.
pub const JPEG_COVER: [u8; 12] = [
    0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0, 1,
];

/// Payload of the `mdat` atom written by [`minimal_m4a`].
pub const MDAT_PAYLOAD: &[u8] = b"sixteen byte pay";

fn atom(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + body.len());
    out.extend_from_slice(&((8 + body.len()) as u32).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(body);
    out
}

/// `ftyp` + `moov(mvhd)` + `mdat`: an MP4 container without tracks.
pub fn minimal_m4a() -> Vec<u8> {
    let mut ftyp = Vec::new();
    ftyp.extend_from_slice(b"M4A ");
    ftyp.extend_from_slice(&0u32.to_be_bytes());
    ftyp.extend_from_slice(b"M4A isom");

    // version 0 movie header
    let mut mvhd = vec![0u8; 100];
    mvhd[12..16].copy_from_slice(&1000u32.to_be_bytes());
    mvhd[20..24].copy_from_slice(&0x0001_0000u32.to_be_bytes());
    mvhd[24..26].copy_from_slice(&0x0100u16.to_be_bytes());
    mvhd[96..100].copy_from_slice(&2u32.to_be_bytes());

    let mut file = atom(b"ftyp", &ftyp);
    file.extend(atom(b"moov", &atom(b"mvhd", &mvhd)));
    file.extend(atom(b"mdat", MDAT_PAYLOAD));
    file
}
