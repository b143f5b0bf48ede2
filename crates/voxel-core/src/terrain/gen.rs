use contracts::WorldConfig;

use crate::catalog::{self, BlockId};
use crate::mathx::{clamp_permille, floor_div, hash2, scale_permille};
use crate::terrain::chunk::CHUNK_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Biome {
    Plains,
    Forest,
    Desert,
}

impl Biome {
    pub fn from_noise(noise: u64) -> Self {
        match noise % 3 {
            0 => Self::Plains,
            1 => Self::Forest,
            _ => Self::Desert,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plains => "PLAINS",
            Self::Forest => "FOREST",
            Self::Desert => "DESERT",
        }
    }
}

/// Block ids the generator may emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPalette {
    pub air: BlockId,
    pub dirt: BlockId,
    pub grass: BlockId,
    pub sand: BlockId,
    pub stone: BlockId,
    pub gravel: BlockId,
    pub log: BlockId,
    pub coal_ore: BlockId,
    pub iron_ore: BlockId,
    pub copper_ore: BlockId,
    pub crystal_ore: BlockId,
}

impl Default for BlockPalette {
    fn default() -> Self {
        Self {
            air: catalog::AIR,
            dirt: catalog::DIRT,
            grass: catalog::GRASS,
            sand: catalog::SAND,
            stone: catalog::STONE,
            gravel: catalog::GRAVEL,
            log: catalog::LOG,
            coal_ore: catalog::COAL_ORE,
            iron_ore: catalog::IRON_ORE,
            copper_ore: catalog::COPPER_ORE,
            crystal_ore: catalog::CRYSTAL_ORE,
        }
    }
}

/// One cluster layer: seed offset, lattice spacing, blob radius, base probability.
#[derive(Debug, Clone, Copy)]
struct Layer {
    seed_offset: i64,
    grid: i64,
    radius: i64,
    base_permille: u64,
}

const fn layer(seed_offset: i64, grid: i64, radius: i64, base_permille: u64) -> Layer {
    Layer {
        seed_offset,
        grid,
        radius,
        base_permille,
    }
}

// Crystal, iron, copper, coal.
const ORE_LAYERS: [Layer; 4] = [
    layer(101, 192, 2, 200),
    layer(102, 128, 3, 450),
    layer(103, 128, 3, 450),
    layer(104, 64, 4, 650),
];
// Log, stone, dirt, gravel.
const FOREST_LAYERS: [Layer; 4] = [
    layer(201, 48, 4, 450),
    layer(202, 32, 4, 500),
    layer(203, 48, 3, 350),
    layer(204, 96, 2, 180),
];
// Sand, stone, gravel.
const DESERT_LAYERS: [Layer; 3] = [
    layer(301, 48, 3, 550),
    layer(302, 32, 4, 450),
    layer(303, 96, 2, 200),
];
// Dirt, stone, gravel.
const PLAINS_LAYERS: [Layer; 3] = [
    layer(401, 48, 3, 400),
    layer(402, 32, 4, 500),
    layer(403, 96, 2, 180),
];

const SPRINKLE_SEED_OFFSET: i64 = 999;

/// Immutable generator configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldGen {
    pub seed: i64,
    /// Blocks from the origin on each axis; 0 means unbounded.
    pub boundary_r: i32,
    pub biome_region_size: i32,
    pub spawn_clear_radius: i32,
    pub ore_cluster_prob_scale_permille: i32,
    pub terrain_cluster_prob_scale_permille: i32,
    pub sprinkle_stone_permille: i32,
    pub sprinkle_dirt_permille: i32,
    pub sprinkle_log_permille: i32,
    pub palette: BlockPalette,
}

impl Default for WorldGen {
    fn default() -> Self {
        Self::from_config(&WorldConfig::default())
    }
}

impl WorldGen {
    pub fn from_config(config: &WorldConfig) -> Self {
        Self {
            seed: config.seed,
            boundary_r: config.boundary_r,
            biome_region_size: config.biome_region_size,
            spawn_clear_radius: config.spawn_clear_radius,
            ore_cluster_prob_scale_permille: config.ore_cluster_prob_scale_permille,
            terrain_cluster_prob_scale_permille: config.terrain_cluster_prob_scale_permille,
            sprinkle_stone_permille: config.sprinkle_stone_permille,
            sprinkle_dirt_permille: config.sprinkle_dirt_permille,
            sprinkle_log_permille: config.sprinkle_log_permille,
            palette: BlockPalette::default(),
        }
    }

    pub fn biome_at(&self, x: i64, z: i64) -> Biome {
        biome_at(self.seed, x, z, i64::from(self.biome_region_size))
    }

    fn layer_hit(&self, layer: &Layer, scale: i32, x: i64, z: i64) -> bool {
        in_cluster(
            self.seed.wrapping_add(layer.seed_offset),
            x,
            z,
            layer.grid,
            layer.radius,
            scale_permille(layer.base_permille, scale),
        )
    }

    fn first_layer(&self, layers: &[Layer], blocks: &[BlockId], scale: i32, x: i64, z: i64) -> Option<BlockId> {
        layers
            .iter()
            .zip(blocks)
            .find(|(layer, _)| self.layer_hit(layer, scale, x, z))
            .map(|(_, block)| *block)
    }

    /// The block generated at world column `(x, z)`.
    pub fn block_at(&self, x: i64, z: i64) -> BlockId {
        let p = &self.palette;
        if within_spawn_clear(x, z, i64::from(self.spawn_clear_radius)) {
            return p.air;
        }
        let biome = self.biome_at(x, z);

        let ores = [p.crystal_ore, p.iron_ore, p.copper_ore, p.coal_ore];
        if let Some(ore) =
            self.first_layer(&ORE_LAYERS, &ores, self.ore_cluster_prob_scale_permille, x, z)
        {
            return ore;
        }

        let scale = self.terrain_cluster_prob_scale_permille;
        let terrain = match biome {
            Biome::Forest => {
                self.first_layer(&FOREST_LAYERS, &[p.log, p.stone, p.dirt, p.gravel], scale, x, z)
            }
            Biome::Desert => self.first_layer(&DESERT_LAYERS, &[p.sand, p.stone, p.gravel], scale, x, z),
            Biome::Plains => self.first_layer(&PLAINS_LAYERS, &[p.dirt, p.stone, p.gravel], scale, x, z),
        };
        match terrain {
            Some(block) if block != p.air => block,
            _ => self.sprinkle(biome, x, z),
        }
    }

    fn sprinkle(&self, biome: Biome, x: i64, z: i64) -> BlockId {
        let p = &self.palette;
        let roll = hash2(self.seed.wrapping_add(SPRINKLE_SEED_OFFSET), x, z) % 1000;
        let stone = clamp_permille(self.sprinkle_stone_permille) as u64;
        let dirt = stone + clamp_permille(self.sprinkle_dirt_permille) as u64;
        let log = dirt + clamp_permille(self.sprinkle_log_permille) as u64;
        if roll < stone {
            p.stone
        } else if roll < dirt {
            if biome == Biome::Desert {
                p.sand
            } else {
                p.dirt
            }
        } else if roll < log && biome == Biome::Forest {
            p.log
        } else {
            p.air
        }
    }

    /// Fills a chunk's 256 cells, x fastest then z.
    pub fn generate_blocks(&self, cx: i32, cz: i32) -> Vec<BlockId> {
        let size = i64::from(CHUNK_SIZE);
        let mut blocks = Vec::with_capacity((CHUNK_SIZE * CHUNK_SIZE) as usize);
        for lz in 0..size {
            for lx in 0..size {
                let wx = i64::from(cx) * size + lx;
                let wz = i64::from(cz) * size + lz;
                blocks.push(self.block_at(wx, wz));
            }
        }
        blocks
    }
}

pub fn biome_at(seed: i64, x: i64, z: i64, region_size: i64) -> Biome {
    let region_size = if region_size <= 0 { 1 } else { region_size };
    Biome::from_noise(hash2(
        seed,
        floor_div(x, region_size),
        floor_div(z, region_size),
    ))
}

pub fn within_spawn_clear(x: i64, z: i64, radius: i64) -> bool {
    if radius <= 0 {
        return false;
    }
    x * x + z * z <= radius * radius
}

/// True when any of the nine lattice cells around `(x, z)` hosts a blob covering it.
pub fn in_cluster(seed: i64, x: i64, z: i64, grid: i64, radius: i64, prob_permille: u64) -> bool {
    if grid <= 0 || radius <= 0 || prob_permille == 0 {
        return false;
    }
    let gx = floor_div(x, grid);
    let gz = floor_div(z, grid);
    let r2 = radius * radius;

    for dz in -1..=1 {
        for dx in -1..=1 {
            let cgx = gx + dx;
            let cgz = gz + dz;
            let h = hash2(seed, cgx, cgz);
            if h % 1000 >= prob_permille {
                continue;
            }
            let ox = ((h >> 10) % grid as u64) as i64;
            let oz = ((h >> 20) % grid as u64) as i64;
            let ddx = x - (cgx * grid + ox);
            let ddz = z - (cgz * grid + oz);
            if ddx * ddx + ddz * ddz <= r2 {
                return true;
            }
        }
    }
    false
}
