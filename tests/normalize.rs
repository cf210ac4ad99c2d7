use boxart::normalize::{FALLBACK_TITLE, normalize};

#[test]
fn launcher_filenames() {
    let cases = [
        ("Sonic_The Hedgehog.zip", "Sonic The Hedgehog"),
        ("Sonic The Hedgehog.md", "Sonic The Hedgehog"),
        ("roms/amiga/Turrican_II.adf", "Turrican II"),
        ("Legend of Zelda, The - A Link to the Past (USA).sfc", "Legend of Zelda The A Link to the Past USA"),
        ("Final Fantasy VII (Disc 1).chd", "Final Fantasy VII Disc 1"),
        ("   Lemmings   ", "Lemmings"),
    ];
    for (raw, expected) in cases {
        assert_eq!(normalize(raw), expected, "input: {raw:?}");
    }
}

#[test]
fn long_suffix_is_not_an_extension() {
    assert_eq!(normalize("Pinball Dreams.collection"), "Pinball Dreams collection");
}

#[test]
fn nothing_left_is_the_fallback() {
    assert_eq!(normalize("().zip"), FALLBACK_TITLE);
    assert_eq!(normalize("C:\\roms\\"), FALLBACK_TITLE);
}
