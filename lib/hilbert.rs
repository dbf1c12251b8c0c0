//! Definitions to describe bases, states, and operators over them.

use std::fmt;
use ndarray as nd;
use num_complex::Complex64 as C64;

/* Bases **********************************************************************/

/// Identity tag for a Hilbert space.
///
/// Two bases are compatible *if and only if* they are equal as identities;
/// equal dimension alone is never sufficient.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Basis {
    label: String,
    dim: usize,
}

impl Basis {
    /// Create a new basis tag with dimension `dim`.
    pub fn new<L>(label: L, dim: usize) -> Self
    where L: Into<String>
    {
        Self { label: label.into(), dim }
    }

    /// Return the basis label.
    pub fn label(&self) -> &str { &self.label }

    /// Return the dimension of the Hilbert space.
    pub fn dim(&self) -> usize { self.dim }
}

impl fmt::Display for Basis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<{}>", self.label, self.dim)
    }
}

/* States *********************************************************************/

/// A state vector over a fixed basis.
#[derive(Clone, Debug, PartialEq)]
pub struct Ket {
    pub(crate) basis: Basis,
    pub(crate) data: nd::Array1<C64>,
}

impl Ket {
    /// Create a new ket from a pre-constructed array.
    ///
    /// The array must have length equal to the dimension of `basis`.
    pub fn new(basis: Basis, data: nd::Array1<C64>) -> Option<Self> {
        (data.len() == basis.dim()).then_some(Self { basis, data })
    }

    /// Create the `index`-th basis state of `basis`.
    pub fn basis_state(basis: Basis, index: usize) -> Option<Self> {
        (index < basis.dim())
            .then(|| {
                let mut data: nd::Array1<C64>
                    = nd::Array1::zeros(basis.dim());
                data[index] = 1.0.into();
                Self { basis, data }
            })
    }

    /// Return the basis tag.
    pub fn basis(&self) -> &Basis { &self.basis }

    /// Return a reference to the underlying amplitude array.
    pub fn data(&self) -> &nd::Array1<C64> { &self.data }

    /// Return the dual (conjugate) bra over the same basis.
    pub fn dag(&self) -> Bra {
        Bra {
            basis: self.basis.clone(),
            data: self.data.mapv(|a| a.conj()),
        }
    }

    /// Return the quadrature-sum norm of the amplitudes.
    pub fn norm(&self) -> f64 {
        self.data.iter().map(|a| a.norm_sqr()).sum::<f64>().sqrt()
    }
}

/// The dual covector of a [`Ket`] over a fixed basis.
///
/// Kets and bras over the same basis are not interchangeable.
#[derive(Clone, Debug, PartialEq)]
pub struct Bra {
    pub(crate) basis: Basis,
    pub(crate) data: nd::Array1<C64>,
}

impl Bra {
    /// Create a new bra from a pre-constructed array.
    ///
    /// The array must have length equal to the dimension of `basis`.
    pub fn new(basis: Basis, data: nd::Array1<C64>) -> Option<Self> {
        (data.len() == basis.dim()).then_some(Self { basis, data })
    }

    /// Return the basis tag.
    pub fn basis(&self) -> &Basis { &self.basis }

    /// Return a reference to the underlying amplitude array.
    pub fn data(&self) -> &nd::Array1<C64> { &self.data }

    /// Return the dual (conjugate) ket over the same basis.
    pub fn dag(&self) -> Ket {
        Ket {
            basis: self.basis.clone(),
            data: self.data.mapv(|a| a.conj()),
        }
    }

    /// Compute the inner product `⟨self|ket⟩`.
    ///
    /// Fails if the two bases are not equal.
    pub fn dot(&self, ket: &Ket) -> Option<C64> {
        (self.basis == ket.basis)
            .then(|| {
                self.data.iter().zip(&ket.data)
                    .map(|(b, k)| b * k)
                    .sum()
            })
    }

    /// Return the quadrature-sum norm of the amplitudes.
    pub fn norm(&self) -> f64 {
        self.data.iter().map(|a| a.norm_sqr()).sum::<f64>().sqrt()
    }
}

/* Operators ******************************************************************/

/// A linear map taking vectors over the `right` basis to vectors over the
/// `left` basis.
///
/// A generator (Hamiltonian) used for evolution must be square (equal left
/// and right bases), with that basis equal to the evolving state's.
#[derive(Clone, Debug, PartialEq)]
pub struct Operator {
    pub(crate) left: Basis,
    pub(crate) right: Basis,
    pub(crate) data: nd::Array2<C64>,
}

impl Operator {
    /// Create a new operator from a pre-constructed array.
    ///
    /// The array must have shape `(left.dim(), right.dim())`.
    pub fn new(left: Basis, right: Basis, data: nd::Array2<C64>)
        -> Option<Self>
    {
        (data.shape() == [left.dim(), right.dim()])
            .then_some(Self { left, right, data })
    }

    /// Create a new square operator acting within a single basis.
    ///
    /// The array must be square with dimension equal to that of `basis`.
    pub fn square(basis: Basis, data: nd::Array2<C64>) -> Option<Self> {
        (data.shape() == [basis.dim(); 2])
            .then(|| Self { left: basis.clone(), right: basis, data })
    }

    /// Create the identity operator on `basis`.
    pub fn identity(basis: Basis) -> Self {
        let data: nd::Array2<C64> = nd::Array2::eye(basis.dim());
        Self { left: basis.clone(), right: basis, data }
    }

    /// Return the left (output-side) basis tag.
    pub fn left_basis(&self) -> &Basis { &self.left }

    /// Return the right (input-side) basis tag.
    pub fn right_basis(&self) -> &Basis { &self.right }

    /// Return `true` if the left and right bases are equal.
    pub fn is_square(&self) -> bool { self.left == self.right }

    /// Return a reference to the underlying matrix.
    pub fn data(&self) -> &nd::Array2<C64> { &self.data }

    /// Apply the operator to a ket over the right basis, producing a ket over
    /// the left basis.
    ///
    /// Fails if the ket's basis is not equal to the right basis.
    pub fn dot(&self, ket: &Ket) -> Option<Ket> {
        (self.right == ket.basis)
            .then(|| Ket {
                basis: self.left.clone(),
                data: self.data.dot(&ket.data),
            })
    }
}

/// An [`Operator`] in the state role: the evolution map `U(t)`, evolved by the
/// same equation as a ket.
pub type Propagator = Operator;

/* Evolvable states ***********************************************************/

/// Discriminant of the three state kinds accepted by the evolution drivers.
///
/// The kind fixes the sign and side convention of the derivative formula:
/// kets and propagators evolve as `-i H ψ` (generator on the left), bras as
/// `+i ψ H` (generator on the right).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StateKind {
    Ket,
    Bra,
    Propagator,
}

/// Tagged variant over the state kinds accepted by the evolution drivers.
#[derive(Clone, Debug, PartialEq)]
pub enum EvolvableState {
    /// An ordinary state vector.
    Ket(Ket),
    /// A dual covector.
    Bra(Bra),
    /// An operator evolved as a state, representing `U(t)`. Must be square;
    /// prefer the checked [`propagator`][Self::propagator] constructor. The
    /// drivers reject a rectangular operator placed here.
    Propagator(Operator),
}

impl From<Ket> for EvolvableState {
    fn from(ket: Ket) -> Self { Self::Ket(ket) }
}

impl From<Bra> for EvolvableState {
    fn from(bra: Bra) -> Self { Self::Bra(bra) }
}

impl EvolvableState {
    /// Create a new [`Self::Propagator`].
    ///
    /// Fails if `op` is not square.
    pub fn propagator(op: Operator) -> Option<Self> {
        op.is_square().then_some(Self::Propagator(op))
    }

    /// Return the kind discriminant.
    pub fn kind(&self) -> StateKind {
        match self {
            Self::Ket(_) => StateKind::Ket,
            Self::Bra(_) => StateKind::Bra,
            Self::Propagator(_) => StateKind::Propagator,
        }
    }

    /// Return the basis tag the state lives in.
    ///
    /// For a propagator this is the shared left/right basis.
    pub fn basis(&self) -> &Basis {
        match self {
            Self::Ket(ket) => &ket.basis,
            Self::Bra(bra) => &bra.basis,
            Self::Propagator(op) => &op.left,
        }
    }

    /// Return a reference to the inner [`Ket`], if there is one.
    pub fn as_ket(&self) -> Option<&Ket> {
        match self {
            Self::Ket(ket) => Some(ket),
            _ => None,
        }
    }

    /// Return a reference to the inner [`Bra`], if there is one.
    pub fn as_bra(&self) -> Option<&Bra> {
        match self {
            Self::Bra(bra) => Some(bra),
            _ => None,
        }
    }

    /// Return a reference to the inner [`Propagator`], if there is one.
    pub fn as_propagator(&self) -> Option<&Propagator> {
        match self {
            Self::Propagator(op) => Some(op),
            _ => None,
        }
    }

    /// Return the quadrature-sum norm of the underlying buffer.
    pub fn norm(&self) -> f64 {
        match self {
            Self::Ket(ket) => ket.norm(),
            Self::Bra(bra) => bra.norm(),
            Self::Propagator(op)
                => op.data.iter()
                    .map(|a| a.norm_sqr())
                    .sum::<f64>()
                    .sqrt(),
        }
    }
}

/// Borrowed view of the evolving state, handed to output and generator
/// callbacks.
///
/// The underlying buffer is a transient alias still owned by the integrator
/// and is overwritten between calls; it cannot be retained past the callback.
/// A caller wanting a persistent record must duplicate it explicitly with
/// [`Self::to_state`].
#[derive(Copy, Clone, Debug)]
pub enum StateView<'a> {
    /// View of an evolving ket.
    Ket(&'a Basis, nd::ArrayView1<'a, C64>),
    /// View of an evolving bra.
    Bra(&'a Basis, nd::ArrayView1<'a, C64>),
    /// View of an evolving propagator.
    Propagator(&'a Basis, nd::ArrayView2<'a, C64>),
}

impl<'a> StateView<'a> {
    /// Return the kind discriminant.
    pub fn kind(&self) -> StateKind {
        match self {
            Self::Ket(..) => StateKind::Ket,
            Self::Bra(..) => StateKind::Bra,
            Self::Propagator(..) => StateKind::Propagator,
        }
    }

    /// Return the basis tag the state lives in.
    pub fn basis(&self) -> &'a Basis {
        match *self {
            Self::Ket(basis, _) => basis,
            Self::Bra(basis, _) => basis,
            Self::Propagator(basis, _) => basis,
        }
    }

    /// Return the quadrature-sum norm of the viewed buffer.
    pub fn norm(&self) -> f64 {
        match self {
            Self::Ket(_, data) | Self::Bra(_, data)
                => data.iter().map(|a| a.norm_sqr()).sum::<f64>().sqrt(),
            Self::Propagator(_, data)
                => data.iter().map(|a| a.norm_sqr()).sum::<f64>().sqrt(),
        }
    }

    /// Duplicate the viewed buffer into an owned state.
    pub fn to_state(&self) -> EvolvableState {
        match self {
            Self::Ket(basis, data)
                => EvolvableState::Ket(Ket {
                    basis: (*basis).clone(),
                    data: data.to_owned(),
                }),
            Self::Bra(basis, data)
                => EvolvableState::Bra(Bra {
                    basis: (*basis).clone(),
                    data: data.to_owned(),
                }),
            Self::Propagator(basis, data)
                => EvolvableState::Propagator(Operator {
                    left: (*basis).clone(),
                    right: (*basis).clone(),
                    data: data.to_owned(),
                }),
        }
    }
}
