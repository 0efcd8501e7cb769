//! Interpolation methods.
//!
//! A [`Method`] turns a pair of representations into a [`WeightMatrix`].
//! Assembly consults the in-process LRU, then the on-disk cache, and only
//! then builds the matrix, validates it and commits it to the cache.
//!
//! ```text
//! Method::assemble(input, output)
//!      │
//!      ├─► MemoryCache hit ───────────────► (matrix, FromMemory)
//!      ├─► Cache::get hit ────────────────► (matrix, FromCache)
//!      │
//!      ├─► build: search / mesh / rows  (rayon over output points)
//!      ├─► validate
//!      └─► Cache::put ──► Stored ─────────► (matrix, Cached)
//!                    └──► lost race, off ─► (matrix, Discarded)
//! ```

mod fe;
mod knn;
mod matrix_import;
mod pseudo_laplace;
mod structured;

pub use matrix_import::export_matrix;
pub use pseudo_laplace::pseudo_laplace_weights;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use point_search::{DistanceWeighting, Pick, PointSearch};
use regrid_common::{BoundingBox, CacheKey, KeyHasher, LatLon, RegridError, RegridResult};
use representation::Representation;
use weight_cache::{Cache, CacheConfig, MemoryCache, PutOutcome};

use crate::config::MethodConfig;
use crate::matrix::{WeightMatrix, MATRIX_VERSION};
use crate::mesh::{MeshGenerator, QuadWeights, StructuredMeshGenerator};
use crate::validate::{check_matrix, MatrixChecks};

/// Neighbours used by `nearest-neighbour`.
const NEAREST_NEIGHBOUR_CANDIDATES: usize = 4;

/// Interpolation families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum MethodKind {
    NearestNeighbour,
    #[default]
    KNearest,
    Linear,
    Bilinear,
    Conservative,
    StructuredBilinear,
    PseudoLaplace,
    MatrixImport,
}

impl MethodKind {
    pub const ALL: [MethodKind; 8] = [
        MethodKind::NearestNeighbour,
        MethodKind::KNearest,
        MethodKind::Linear,
        MethodKind::Bilinear,
        MethodKind::Conservative,
        MethodKind::StructuredBilinear,
        MethodKind::PseudoLaplace,
        MethodKind::MatrixImport,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MethodKind::NearestNeighbour => "nearest-neighbour",
            MethodKind::KNearest => "k-nearest",
            MethodKind::Linear => "linear",
            MethodKind::Bilinear => "bilinear",
            MethodKind::Conservative => "conservative",
            MethodKind::StructuredBilinear => "structured-bilinear",
            MethodKind::PseudoLaplace => "pseudo-laplace",
            MethodKind::MatrixImport => "matrix-import",
        }
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|k| k.as_str()).collect()
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.to_lowercase();
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }

    /// Methods that search the input for neighbours of each output point.
    pub fn uses_point_search(&self) -> bool {
        matches!(
            self,
            MethodKind::NearestNeighbour | MethodKind::KNearest | MethodKind::PseudoLaplace
        )
    }

    /// Methods that interpolate within a mesh.
    pub fn uses_mesh(&self) -> bool {
        matches!(
            self,
            MethodKind::Linear | MethodKind::Bilinear | MethodKind::Conservative
        )
    }

    /// Whether every non-empty row must sum to one.
    pub fn partition_of_unity(&self) -> bool {
        !matches!(self, MethodKind::Conservative | MethodKind::MatrixImport)
    }

    /// Whether weights must be non-negative.
    pub fn non_negative(&self) -> bool {
        !matches!(self, MethodKind::PseudoLaplace | MethodKind::MatrixImport)
    }
}

impl fmt::Display for MethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MethodKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| {
            format!(
                "unknown method '{}', expected one of: {}",
                s,
                Self::names().join(", ")
            )
        })
    }
}

/// Where an assembled matrix came from and what happened to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyOutcome {
    /// Served from the in-process LRU.
    FromMemory,
    /// Read from the on-disk cache.
    FromCache,
    /// Built and committed to the cache.
    Cached,
    /// Built but not committed (cache disabled, absent, failed, or another
    /// process committed the key first).
    Discarded,
    /// Loaded from a matrix file.
    Imported,
}

impl AssemblyOutcome {
    /// Whether the matrix was built by this call.
    pub fn was_computed(&self) -> bool {
        matches!(self, AssemblyOutcome::Cached | AssemblyOutcome::Discarded)
    }
}

/// A configured interpolation method.
///
/// Holds no lazily-built state: spatial indices and meshes live only for
/// one assembly unless the caller passes an index explicitly.
#[derive(Clone)]
pub struct Method {
    kind: MethodKind,
    pick: Pick,
    weighting: DistanceWeighting,
    cropping: Option<BoundingBox>,
    crop_margin: Option<f64>,
    matrix_file: Option<PathBuf>,
    mesh_generator: Arc<dyn MeshGenerator>,
    cache: Option<Cache>,
    memory: Arc<MemoryCache<WeightMatrix>>,
}

impl Method {
    /// Configure a method. No cache is attached.
    pub fn new(config: &MethodConfig) -> RegridResult<Self> {
        config.validate().map_err(RegridError::configuration)?;

        let (pick, weighting) = match config.method {
            MethodKind::NearestNeighbour => (
                Pick::NClosest(NEAREST_NEIGHBOUR_CANDIDATES),
                DistanceWeighting::NearestNeighbourWithLowestIndex,
            ),
            MethodKind::PseudoLaplace => (Pick::NClosest(config.nclosest), DistanceWeighting::default()),
            _ => (config.pick()?, config.distance_weighting()?),
        };

        Ok(Self {
            kind: config.method,
            pick,
            weighting,
            cropping: config.cropping_area()?,
            crop_margin: config.crop_input_to_output.then_some(config.crop_margin),
            matrix_file: config.matrix_file.clone(),
            mesh_generator: Arc::new(StructuredMeshGenerator),
            cache: None,
            memory: Arc::new(MemoryCache::new(0)),
        })
    }

    /// A method with default parameters.
    pub fn from_kind(kind: MethodKind) -> RegridResult<Self> {
        Self::new(&MethodConfig::for_method(kind))
    }

    /// Configure a method with the caches described by `cache`.
    pub fn from_configs(config: &MethodConfig, cache: &CacheConfig) -> RegridResult<Self> {
        Ok(Self::new(config)?
            .with_cache(cache.matrix_cache())
            .with_memory_cache(cache.memory_cache_entries))
    }

    pub fn with_cache(mut self, cache: Cache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Keep up to `entries` assembled matrices in process memory.
    pub fn with_memory_cache(mut self, entries: usize) -> Self {
        self.memory = Arc::new(MemoryCache::new(entries));
        self
    }

    pub fn with_mesh_generator(mut self, generator: Arc<dyn MeshGenerator>) -> Self {
        self.mesh_generator = generator;
        self
    }

    pub fn kind(&self) -> MethodKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.as_str()
    }

    pub fn cache(&self) -> Option<&Cache> {
        self.cache.as_ref()
    }

    /// Same kind and same parameters.
    pub fn same_as(&self, other: &Method) -> bool {
        self.digest() == other.digest()
    }

    /// Feed the kind and every parameter that affects the weights into a
    /// cache-key digest.
    pub fn hash(&self, hasher: &mut KeyHasher) {
        hasher.add_str(self.kind.as_str());
        if self.kind.uses_point_search() {
            self.pick.hash(hasher);
        }
        if self.kind == MethodKind::KNearest {
            self.weighting.hash(hasher);
        }
        if self.kind.uses_mesh() {
            hasher.add_str(self.mesh_generator.name());
        }
        if self.kind == MethodKind::MatrixImport {
            let file = self.matrix_file.as_deref().map(|p| p.display().to_string());
            hasher.add_str(file.as_deref().unwrap_or(""));
        }
        hasher.add_bool(self.cropping.is_some());
        if let Some(area) = &self.cropping {
            area.hash(hasher);
        }
    }

    fn digest(&self) -> CacheKey {
        let mut hasher = KeyHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }

    /// Key of the matrix between `input` and `output`.
    pub fn cache_key(&self, input: &Representation, output: &Representation) -> CacheKey {
        let mut hasher = KeyHasher::new();
        hasher.add_str("weight-matrix");
        hasher.add_u64(MATRIX_VERSION as u64);
        self.hash(&mut hasher);
        input.hash(&mut hasher);
        output.hash(&mut hasher);
        hasher.finish()
    }

    /// Weight matrix from `input` points to `output` points.
    #[instrument(skip_all, fields(method = %self.kind, input = %input.short_name(), output = %output.short_name()))]
    pub fn assemble(
        &self,
        input: &Representation,
        output: &Representation,
    ) -> RegridResult<(Arc<WeightMatrix>, AssemblyOutcome)> {
        self.assemble_inner(input, output, None)
    }

    /// Like [`Method::assemble`], searching `index` instead of building one.
    ///
    /// `index` must cover every point of `input` with payloads equal to the
    /// point indices, as [`PointSearch::from_representation`] builds it. It
    /// is only used by neighbour-search methods, which cannot take one when
    /// a cropping area is configured.
    #[instrument(skip_all, fields(method = %self.kind, input = %input.short_name(), output = %output.short_name()))]
    pub fn assemble_with_index(
        &self,
        input: &Representation,
        output: &Representation,
        index: &PointSearch,
    ) -> RegridResult<(Arc<WeightMatrix>, AssemblyOutcome)> {
        if index.len() != input.number_of_points() {
            return Err(RegridError::DimensionMismatch {
                expected: input.number_of_points(),
                actual: index.len(),
            });
        }
        if self.cropping.is_some() && self.kind.uses_point_search() {
            return Err(RegridError::unsupported(format!(
                "{} with a cropping area searches its own cropped index",
                self.name()
            )));
        }
        self.assemble_inner(input, output, Some(index))
    }

    fn assemble_inner(
        &self,
        input: &Representation,
        output: &Representation,
        index: Option<&PointSearch>,
    ) -> RegridResult<(Arc<WeightMatrix>, AssemblyOutcome)> {
        if self.kind == MethodKind::MatrixImport {
            let path = self.matrix_file.as_deref().ok_or_else(|| {
                RegridError::configuration("matrix-import requires matrix_file")
            })?;
            let matrix = matrix_import::load(path, input, output)?;
            return Ok((Arc::new(matrix), AssemblyOutcome::Imported));
        }

        let key = self.cache_key(input, output);

        if let Some(matrix) = self.memory.get(&key) {
            debug!(key = %key, "Weight matrix found in memory");
            return Ok((matrix, AssemblyOutcome::FromMemory));
        }

        let rows = output.number_of_points();
        let cols = input.number_of_points();
        if let Some(matrix) = self.load_cached(&key, rows, cols) {
            let matrix = Arc::new(matrix);
            self.memory.insert(key, Arc::clone(&matrix));
            return Ok((matrix, AssemblyOutcome::FromCache));
        }

        let start = Instant::now();
        let matrix = self
            .build(input, output, index)
            .map_err(|e| e.with_context(self.name(), input.short_name(), output.short_name()))?;

        info!(
            key = %key,
            rows = matrix.rows(),
            cols = matrix.cols(),
            nnz = matrix.nnz(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Assembled weight matrix"
        );

        let outcome = self.store(&key, &matrix);
        let matrix = Arc::new(matrix);
        self.memory.insert(key, Arc::clone(&matrix));
        Ok((matrix, outcome))
    }

    fn load_cached(&self, key: &CacheKey, rows: usize, cols: usize) -> Option<WeightMatrix> {
        let cache = self.cache.as_ref()?;

        let handle = match cache.get(key) {
            Ok(Some(handle)) => handle,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed, recomputing");
                return None;
            }
        };

        let decoded = handle
            .payload()
            .map_err(|e| e.to_string())
            .and_then(|payload| WeightMatrix::from_bytes(payload).map_err(|e| e.to_string()));

        match decoded {
            Ok(matrix) if matrix.rows() == rows && matrix.cols() == cols => {
                debug!(key = %key, nnz = matrix.nnz(), loader = %cache.loader(), "Weight matrix loaded from cache");
                Some(matrix)
            }
            Ok(matrix) => {
                warn!(
                    key = %key,
                    rows = matrix.rows(),
                    cols = matrix.cols(),
                    "Cached matrix has the wrong shape, recomputing"
                );
                drop(handle);
                self.discard(cache, key);
                None
            }
            Err(reason) => {
                warn!(key = %key, error = %reason, "Cached matrix does not decode, recomputing");
                drop(handle);
                self.discard(cache, key);
                None
            }
        }
    }

    fn discard(&self, cache: &Cache, key: &CacheKey) {
        if let Err(e) = cache.remove(key) {
            warn!(key = %key, error = %e, "Failed to remove unusable cache entry");
        }
    }

    fn store(&self, key: &CacheKey, matrix: &WeightMatrix) -> AssemblyOutcome {
        let Some(cache) = &self.cache else {
            return AssemblyOutcome::Discarded;
        };
        match cache.put(key, &matrix.to_bytes()) {
            Ok(PutOutcome::Stored) => AssemblyOutcome::Cached,
            Ok(PutOutcome::LostRace) | Ok(PutOutcome::Skipped) => AssemblyOutcome::Discarded,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to store weight matrix");
                AssemblyOutcome::Discarded
            }
        }
    }

    fn build(
        &self,
        input: &Representation,
        output: &Representation,
        index: Option<&PointSearch>,
    ) -> RegridResult<WeightMatrix> {
        let targets = output_targets(output, self.cropping.as_ref())?;

        let matrix = match self.kind {
            MethodKind::NearestNeighbour | MethodKind::KNearest | MethodKind::PseudoLaplace => {
                let cols = input.number_of_points();
                let weights = match self.kind {
                    MethodKind::PseudoLaplace => knn::RowWeights::PseudoLaplace,
                    _ => knn::RowWeights::Distance(&self.weighting),
                };
                match index {
                    Some(tree) => {
                        let pick = self.search_pick(tree.len());
                        knn::assemble(tree, &targets, cols, &pick, weights)?
                    }
                    None => {
                        let domain = self.input_domain(input, output)?;
                        let pick = self.search_pick(domain.len(input));
                        match &domain.near_output {
                            Some((area, near)) => knn::assemble_near(
                                &PointSearch::from_subset(input, near)?,
                                area,
                                || domain.tree(input),
                                &targets,
                                cols,
                                &pick,
                                weights,
                            )?,
                            None => {
                                knn::assemble(&domain.tree(input)?, &targets, cols, &pick, weights)?
                            }
                        }
                    }
                }
            }
            MethodKind::Linear => fe::interpolate(
                self.mesh_generator.as_ref(),
                input,
                &targets,
                QuadWeights::Triangulated,
            )?,
            MethodKind::Bilinear => fe::interpolate(
                self.mesh_generator.as_ref(),
                input,
                &targets,
                QuadWeights::Bilinear,
            )?,
            MethodKind::Conservative => fe::conservative(
                self.mesh_generator.as_ref(),
                input,
                output,
                &targets,
                self.cropping.as_ref(),
            )?,
            MethodKind::StructuredBilinear => structured::assemble(input, &targets)?,
            MethodKind::MatrixImport => {
                return Err(RegridError::unsupported("matrix-import does not assemble"))
            }
        };

        check_matrix(
            &matrix,
            &self.checks(),
            self.name(),
            &input.short_name(),
            &output.short_name(),
        )?;
        Ok(matrix)
    }

    fn checks(&self) -> MatrixChecks {
        let allow_empty_rows = self.cropping.is_some()
            || (self.kind.uses_point_search() && self.pick.allows_empty())
            || matches!(
                self.kind,
                MethodKind::StructuredBilinear | MethodKind::Conservative
            );
        MatrixChecks {
            partition_of_unity: self.kind.partition_of_unity(),
            non_negative: self.kind.non_negative(),
            allow_empty_rows,
            ..MatrixChecks::default()
        }
    }

    /// Neighbour selection over a search domain of `available` points.
    fn search_pick(&self, available: usize) -> Pick {
        match self.kind {
            MethodKind::NearestNeighbour => {
                Pick::NClosest(NEAREST_NEIGHBOUR_CANDIDATES.min(available))
            }
            _ => self.pick.clone(),
        }
    }

    /// Input points the neighbour search may use: those inside the cropping
    /// area and, if enabled, the subset near the output.
    fn input_domain(
        &self,
        input: &Representation,
        output: &Representation,
    ) -> RegridResult<InputDomain> {
        let around_output = self.crop_margin.and_then(|margin| {
            output
                .bounding_box()
                .filter(|b| !b.is_global())
                .map(|b| b.expand(margin))
                .filter(|b| !b.is_global())
        });

        if self.cropping.is_none() && around_output.is_none() {
            return Ok(InputDomain::default());
        }

        let points: Vec<LatLon> = input.points()?.collect();
        let indices: Option<Vec<usize>> = self.cropping.map(|area| {
            (0..points.len())
                .filter(|&i| area.contains(points[i].lat, points[i].lon))
                .collect()
        });

        if indices.as_ref().is_some_and(|i| i.is_empty()) {
            return Err(RegridError::empty_domain(format!(
                "no points of {} inside the cropping area",
                input
            )));
        }

        let near_output = around_output.and_then(|area| {
            let near: Vec<usize> = match &indices {
                Some(indices) => indices
                    .iter()
                    .copied()
                    .filter(|&i| area.contains(points[i].lat, points[i].lon))
                    .collect(),
                None => (0..points.len())
                    .filter(|&i| area.contains(points[i].lat, points[i].lon))
                    .collect(),
            };
            debug!(
                kept = near.len(),
                total = points.len(),
                "Cropped input to the output area"
            );
            (!near.is_empty()).then_some((area, near))
        });

        Ok(InputDomain {
            indices,
            near_output,
        })
    }
}

/// Input points visible to a neighbour search.
#[derive(Debug, Default)]
struct InputDomain {
    /// Points inside the cropping area, or `None` for every point.
    indices: Option<Vec<usize>>,
    /// Points of the domain inside the area around the output, searched
    /// first.
    near_output: Option<(BoundingBox, Vec<usize>)>,
}

impl InputDomain {
    fn len(&self, input: &Representation) -> usize {
        self.indices
            .as_ref()
            .map_or_else(|| input.number_of_points(), Vec::len)
    }

    fn tree(&self, input: &Representation) -> RegridResult<PointSearch> {
        match &self.indices {
            Some(indices) => PointSearch::from_subset(input, indices),
            None => PointSearch::from_representation(input),
        }
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("kind", &self.kind)
            .field("pick", &self.pick)
            .field("weighting", &self.weighting)
            .field("cropping", &self.cropping)
            .field("crop_margin", &self.crop_margin)
            .field("matrix_file", &self.matrix_file)
            .field("mesh_generator", &self.mesh_generator.name())
            .field("cache", &self.cache.as_ref().map(|c| c.namespace()))
            .finish()
    }
}

/// Output points in order; `None` for points outside `cropping`, whose rows
/// stay empty.
fn output_targets(
    output: &Representation,
    cropping: Option<&BoundingBox>,
) -> RegridResult<Vec<Option<LatLon>>> {
    Ok(output
        .points()?
        .map(|p| match cropping {
            Some(area) if !area.contains(p.lat, p.lon) => None,
            _ => Some(p),
        })
        .collect())
}
