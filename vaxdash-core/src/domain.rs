//! Reference data for South Korea: regions, population, vaccine products.

/// Approximate national population used for coverage percentages.
pub const NATIONAL_POPULATION: u64 = 51_000_000;

/// The 17 first-tier administrative divisions, in reporting order, with their
/// approximate share of the national population.
pub const REGIONS: [(&str, f64); 17] = [
    ("Seoul", 0.20),
    ("Busan", 0.07),
    ("Daegu", 0.05),
    ("Incheon", 0.06),
    ("Gwangju", 0.03),
    ("Daejeon", 0.03),
    ("Ulsan", 0.02),
    ("Sejong", 0.01),
    ("Gyeonggi", 0.25),
    ("Gangwon", 0.03),
    ("Chungbuk", 0.03),
    ("Chungnam", 0.04),
    ("Jeonbuk", 0.03),
    ("Jeonnam", 0.03),
    ("Gyeongbuk", 0.05),
    ("Gyeongnam", 0.06),
    ("Jeju", 0.01),
];

/// Vaccine products administered, with their share of daily doses.
pub const VACCINE_TYPES: [(&str, f64); 5] = [
    ("Pfizer", 0.45),
    ("Moderna", 0.30),
    ("AstraZeneca", 0.15),
    ("Janssen", 0.05),
    ("Novavax", 0.05),
];

/// Position of a region in reporting order, if known.
pub fn region_order(name: &str) -> Option<usize> {
    REGIONS.iter().position(|(r, _)| r.eq_ignore_ascii_case(name))
}
