//! Name normalization used for both the unified exact index and the
//! fuzzy fallback (§4.3 step 2). Roman numeral folding order matters:
//! `" III"` is folded before `" II"` because `" II"` is a leading
//! substring of `" III"` and would otherwise consume it first.

/// Lowercase, strip accents (NFD decomposition, drop combining marks),
/// fold a few Roman numerals to digits, then drop everything that isn't
/// ASCII alphanumeric.
pub fn normalize_game_name(name: &str) -> String {
    let folded = name.replace(" III", "3").replace(" II", " 2").replace(" IV", "4");
    let decomposed = decompose_and_strip_accents(&folded);
    let lowered = decomposed.to_lowercase();
    lowered.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

/// Remove parenthesized groups (region/revision/language tags) before
/// normalizing, producing the "without parenthetical suffixes" variant
/// referenced in §4.3 step 2.
pub fn strip_parentheticals(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut depth = 0u32;
    for c in name.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

/// Both normalization variants for a raw catalog name: with and without
/// parenthetical suffixes.
pub fn normalized_variants(name: &str) -> (String, String) {
    let with_suffix = normalize_game_name(name);
    let without_suffix = normalize_game_name(&strip_parentheticals(name));
    (with_suffix, without_suffix)
}

/// NFD decomposition without pulling in `unicode-normalization`: strips
/// the common Latin-1 combining accents by mapping precomposed
/// characters to their base letter. Covers the accented Latin range the
/// corpus and catalog names actually use; anything else passes through.
fn decompose_and_strip_accents(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => 'A',
            'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
            'È' | 'É' | 'Ê' | 'Ë' => 'E',
            'è' | 'é' | 'ê' | 'ë' => 'e',
            'Ì' | 'Í' | 'Î' | 'Ï' => 'I',
            'ì' | 'í' | 'î' | 'ï' => 'i',
            'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' => 'O',
            'ò' | 'ó' | 'ô' | 'õ' | 'ö' => 'o',
            'Ù' | 'Ú' | 'Û' | 'Ü' => 'U',
            'ù' | 'ú' | 'û' | 'ü' => 'u',
            'Ñ' => 'N',
            'ñ' => 'n',
            'Ç' => 'C',
            'ç' => 'c',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_roman_numerals() {
        assert_eq!(normalize_game_name("Final Fantasy III"), "finalfantasy3");
        assert_eq!(normalize_game_name("Mega Man II"), "megaman2");
        assert_eq!(normalize_game_name("Rocky IV"), "rocky4");
    }

    #[test]
    fn strips_accents_and_lowercases() {
        assert_eq!(normalize_game_name("Pokémon"), "pokemon");
    }

    #[test]
    fn strips_non_alphanumeric() {
        assert_eq!(normalize_game_name("Zelda: A Link to the Past!"), "zeldaalinktothepast");
    }

    #[test]
    fn strip_parentheticals_removes_region_tags() {
        assert_eq!(strip_parentheticals("Sonic the Hedgehog (USA) (Rev A)"), "Sonic the Hedgehog  ");
    }

    #[test]
    fn variants_differ_when_parentheticals_present() {
        let (with_suffix, without_suffix) = normalized_variants("Sonic (USA)");
        assert_eq!(with_suffix, "sonicusa");
        assert_eq!(without_suffix, "sonic");
    }
}
