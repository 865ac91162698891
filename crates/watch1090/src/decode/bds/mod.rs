/*!
 * Typed payloads of the extended squitter ME field, one module per
 * BDS register:
 *
 * - BDS 0,5: airborne position (barometric or GNSS altitude)
 * - BDS 0,6: surface position
 * - BDS 0,8: aircraft identification and category
 * - BDS 0,9: airborne velocity
 * - BDS 6,1: aircraft status (emergency, squawk)
 * - BDS 6,2: target state and status
 * - BDS 6,5: operational status
 */

pub mod bds05;
pub mod bds06;
pub mod bds08;
pub mod bds09;
pub mod bds61;
pub mod bds62;
pub mod bds65;
