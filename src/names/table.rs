use ahash::AHashMap;

use super::normalize::fold;

/// Number of Puerto Rico municipalities (county-equivalents).
pub const MUNICIPALITY_COUNT: usize = 78;

/// (canonical key, official display name, county FIPS)
pub(crate) const MUNICIPALITIES: [(&str, &str, &str); MUNICIPALITY_COUNT] = [
    ("adjuntas", "Adjuntas", "001"),
    ("aguada", "Aguada", "003"),
    ("aguadilla", "Aguadilla", "005"),
    ("aguas buenas", "Aguas Buenas", "007"),
    ("aibonito", "Aibonito", "009"),
    ("anasco", "Añasco", "011"),
    ("arecibo", "Arecibo", "013"),
    ("arroyo", "Arroyo", "015"),
    ("barceloneta", "Barceloneta", "017"),
    ("barranquitas", "Barranquitas", "019"),
    ("bayamon", "Bayamón", "021"),
    ("cabo rojo", "Cabo Rojo", "023"),
    ("caguas", "Caguas", "025"),
    ("camuy", "Camuy", "027"),
    ("canovanas", "Canóvanas", "029"),
    ("carolina", "Carolina", "031"),
    ("catano", "Cataño", "033"),
    ("cayey", "Cayey", "035"),
    ("ceiba", "Ceiba", "037"),
    ("ciales", "Ciales", "039"),
    ("cidra", "Cidra", "041"),
    ("coamo", "Coamo", "043"),
    ("comerio", "Comerío", "045"),
    ("corozal", "Corozal", "047"),
    ("culebra", "Culebra", "049"),
    ("dorado", "Dorado", "051"),
    ("fajardo", "Fajardo", "053"),
    ("florida", "Florida", "054"),
    ("guanica", "Guánica", "055"),
    ("guayama", "Guayama", "057"),
    ("guayanilla", "Guayanilla", "059"),
    ("guaynabo", "Guaynabo", "061"),
    ("gurabo", "Gurabo", "063"),
    ("hatillo", "Hatillo", "065"),
    ("hormigueros", "Hormigueros", "067"),
    ("humacao", "Humacao", "069"),
    ("isabela", "Isabela", "071"),
    ("jayuya", "Jayuya", "073"),
    ("juana diaz", "Juana Díaz", "075"),
    ("juncos", "Juncos", "077"),
    ("lajas", "Lajas", "079"),
    ("lares", "Lares", "081"),
    ("las marias", "Las Marías", "083"),
    ("las piedras", "Las Piedras", "085"),
    ("loiza", "Loíza", "087"),
    ("luquillo", "Luquillo", "089"),
    ("manati", "Manatí", "091"),
    ("maricao", "Maricao", "093"),
    ("maunabo", "Maunabo", "095"),
    ("mayaguez", "Mayagüez", "097"),
    ("moca", "Moca", "099"),
    ("morovis", "Morovis", "101"),
    ("naguabo", "Naguabo", "103"),
    ("naranjito", "Naranjito", "105"),
    ("orocovis", "Orocovis", "107"),
    ("patillas", "Patillas", "109"),
    ("penuelas", "Peñuelas", "111"),
    ("ponce", "Ponce", "113"),
    ("quebradillas", "Quebradillas", "115"),
    ("rincon", "Rincón", "117"),
    ("rio grande", "Río Grande", "119"),
    ("sabana grande", "Sabana Grande", "121"),
    ("salinas", "Salinas", "123"),
    ("san german", "San Germán", "125"),
    ("san juan", "San Juan", "127"),
    ("san lorenzo", "San Lorenzo", "129"),
    ("san sebastian", "San Sebastián", "131"),
    ("santa isabel", "Santa Isabel", "133"),
    ("toa alta", "Toa Alta", "135"),
    ("toa baja", "Toa Baja", "137"),
    ("trujillo alto", "Trujillo Alto", "139"),
    ("utuado", "Utuado", "141"),
    ("vega alta", "Vega Alta", "143"),
    ("vega baja", "Vega Baja", "145"),
    ("vieques", "Vieques", "147"),
    ("villalba", "Villalba", "149"),
    ("yabucoa", "Yabucoa", "151"),
    ("yauco", "Yauco", "153"),
];

/// Abbreviations and recurring misspellings seen in electoral sources.
/// Accent-only variants need no entry; folding already removes them.
pub(crate) const ALIASES: &[(&str, &str)] = &[
    ("sj", "san juan"),
    ("bay", "bayamon"),
    ("pon", "ponce"),
    ("mayaquez", "mayaguez"),
    ("loiza aldea", "loiza"),
    ("juana dias", "juana diaz"),
    ("catanno", "catano"),
    ("anyasco", "anasco"),
    ("penyuelas", "penuelas"),
];

/// A Puerto Rico municipality and its Census county-equivalent FIPS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Municipality {
    pub key: String,
    pub display_name: String,
    pub county_fips: String,
    pub aliases: Vec<String>,
}

/// Immutable municipality lookup, built once and shared by reference.
#[derive(Debug, Clone)]
pub struct MunicipalityTable {
    municipalities: Vec<Municipality>,
    by_key: AHashMap<String, usize>,
    by_alias: AHashMap<String, usize>,
}

impl MunicipalityTable {
    /// The official table of all 78 municipalities.
    pub fn load() -> Self {
        Self::from_entries(&MUNICIPALITIES, ALIASES)
    }

    /// Build a table from explicit entries; aliases naming unknown keys are skipped.
    /// Every multi-word name also gets its run-together form ("sanjuan") as an alias.
    pub fn from_entries(entries: &[(&str, &str, &str)], aliases: &[(&str, &str)]) -> Self {
        let mut municipalities = entries.iter()
            .map(|&(key, display_name, county_fips)| Municipality {
                key: fold(key),
                display_name: display_name.to_string(),
                county_fips: county_fips.to_string(),
                aliases: Vec::new(),
            })
            .collect::<Vec<_>>();

        let by_key = municipalities.iter().enumerate()
            .map(|(i, m)| (m.key.clone(), i))
            .collect::<AHashMap<_, _>>();

        let compact = municipalities.iter().enumerate()
            .filter(|(_, m)| m.key.contains(' '))
            .map(|(i, m)| (m.key.replace(' ', ""), i))
            .collect::<Vec<_>>();

        let explicit = aliases.iter()
            .filter_map(|&(alias, key)| by_key.get(&fold(key)).map(|&i| (fold(alias), i)));

        let mut by_alias = AHashMap::new();
        for (alias, i) in compact.into_iter().chain(explicit) {
            if by_key.contains_key(&alias) { continue }
            municipalities[i].aliases.push(alias.clone());
            by_alias.insert(alias, i);
        }

        Self { municipalities, by_key, by_alias }
    }

    #[inline] pub fn len(&self) -> usize { self.municipalities.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.municipalities.is_empty() }

    #[inline] pub fn iter(&self) -> impl Iterator<Item = &Municipality> { self.municipalities.iter() }

    /// Exact lookup by canonical key or alias (both already folded).
    pub fn lookup(&self, key: &str) -> Option<&Municipality> {
        self.by_key.get(key)
            .or_else(|| self.by_alias.get(key))
            .map(|&i| &self.municipalities[i])
    }

    pub fn by_fips(&self, county_fips: &str) -> Option<&Municipality> {
        self.municipalities.iter().find(|m| m.county_fips == county_fips)
    }
}
